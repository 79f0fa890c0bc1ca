//! Cryptographic primitives for quotes
//!
//! This module provides:
//! - Canonical, encoding-stable quote bytes and their BLAKE3 hash
//! - Ed25519 signing and verification of quotes
//! - did:key rendering of operator identities

pub mod canonical;
pub mod did;
pub mod signer;

// Re-export commonly used items
pub use canonical::{encode_quote, quote_hash};
pub use signer::{verify_signed_quote, QuoteSigner};
