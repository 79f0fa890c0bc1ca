//! # Opquote Common
//!
//! Shared types, errors, and signing primitives for the Operator Pricing Engine.
//!
//! ## Core Types
//!
//! - [`ResourceRequirement`]/[`ResourcePricing`]: requested quantities and their rates
//! - [`BenchmarkProfile`]: measured operator capability for one workload
//! - [`AssetSecurityRequirement`]/[`AssetSecurityCommitment`]: exposure bounds and promises
//! - [`QuoteRequest`]/[`QuoteDetails`]/[`SignedQuote`]: the quote lifecycle
//!
//! ## Crypto
//!
//! - [`crypto::canonical`]: fixed byte encoding of quote bodies
//! - [`crypto::signer`]: BLAKE3 + Ed25519 quote signing and verification
//! - [`crypto::did`]: `did:key` rendering of operator identities
//!
//! Clients that only need to check an operator's quote depend on this crate
//! alone; the engine crate builds on top of it.

pub mod crypto;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use crypto::signer::{verify_signed_quote, QuoteSigner};
pub use error::{
    CryptoError, OpQuoteError, PricingError, ProofOfWorkError, RejectionReason, Result,
    SecurityError,
};
pub use types::{
    benchmark::BenchmarkProfile,
    quote::{QuoteDetails, QuoteRequest, SignedQuote},
    resource::{ResourceKind, ResourcePricing, ResourceRequirement},
    security::{Asset, AssetSecurityCommitment, AssetSecurityRequirement},
};

/// Opquote version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Block time of the host chain in seconds
pub const BLOCK_TIME_SECONDS: u64 = 6;

/// Upper bound of every exposure percentage
pub const MAX_EXPOSURE_PERCENT: u8 = 100;

/// Default quote validity period in seconds (5 minutes)
pub const DEFAULT_QUOTE_VALIDITY_SECS: u64 = 300;

/// Default proof-of-work difficulty in leading zero bits
pub const DEFAULT_POW_DIFFICULTY_BITS: u8 = 20;

/// Default proof-of-work window in seconds
pub const DEFAULT_POW_WINDOW_SECS: u64 = 60;

/// Size of an Ed25519 operator identity in bytes
pub const OPERATOR_ID_LEN: usize = 32;
