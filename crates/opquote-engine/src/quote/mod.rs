//! Quote issuance

pub mod service;

pub use service::{unix_now, QuoteService, QuoteSettings, QuoteState};
