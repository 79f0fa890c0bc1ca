//! Error types for the pricing engine
//!
//! Provides a unified error type, domain-specific error variants, and the
//! rejection taxonomy reported back to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::resource::ResourceKind;

/// Result type alias using OpQuoteError
pub type Result<T> = std::result::Result<T, OpQuoteError>;

/// Unified error type for quote operations
#[derive(Debug, Error)]
pub enum OpQuoteError {
    // Admission errors
    #[error("Proof-of-work rejected: {0}")]
    ProofOfWork(#[from] ProofOfWorkError),

    // Pricing errors
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    // Security commitment errors
    #[error("Security requirement error: {0}")]
    Security(#[from] SecurityError),

    // Crypto errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Proof-of-work admission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofOfWorkError {
    #[error("proof of work is missing")]
    Missing,

    #[error("malformed proof: {0}")]
    Malformed(String),

    #[error("stale challenge window {window_start} (current window {current_window})")]
    StaleWindow { window_start: u64, current_window: u64 },

    #[error("insufficient work: {leading_zeros} leading zero bits < {required} required")]
    InsufficientWork { leading_zeros: u32, required: u8 },

    #[error("proof already used within its validity window")]
    Replayed,
}

/// Pricing calculation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("No benchmark profile cached for workload {0}")]
    UnknownWorkload(u64),

    #[error("No pricing entry for resource kind {0}")]
    UnknownResourceKind(String),

    #[error("Invalid TTL: {ttl_blocks} blocks (allowed 1..={max_ttl_blocks})")]
    InvalidTtl { ttl_blocks: u64, max_ttl_blocks: u64 },

    #[error("Requested {requested} of {kind} exceeds benchmarked capacity {capacity}")]
    CapacityExceeded {
        kind: ResourceKind,
        requested: u64,
        capacity: u64,
    },

    #[error("Fatal: pricing computation error: {0}")]
    Computation(String),
}

/// Security requirement errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("Invalid exposure range: minimum {minimum}% / maximum {maximum}%")]
    InvalidRange { minimum: u8, maximum: u8 },

    #[error("Invalid adjustment curve: {0}")]
    InvalidCurve(String),
}

/// Cryptographic operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid public key")]
    InvalidPublicKey,
}

/// Reason a quote request was refused, as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InvalidProofOfWork,
    UnknownWorkload,
    UnknownResourceKind,
    InvalidSecurityRange,
    InvalidRequest,
    InsufficientCapacity,
    SigningFailure,
    InternalComputationError,
}

impl RejectionReason {
    /// Stable label used in logs, metrics and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InvalidProofOfWork => "invalid_proof_of_work",
            RejectionReason::UnknownWorkload => "unknown_workload",
            RejectionReason::UnknownResourceKind => "unknown_resource_kind",
            RejectionReason::InvalidSecurityRange => "invalid_security_range",
            RejectionReason::InvalidRequest => "invalid_request",
            RejectionReason::InsufficientCapacity => "insufficient_capacity",
            RejectionReason::SigningFailure => "signing_failure",
            RejectionReason::InternalComputationError => "internal_computation_error",
        }
    }

    /// Whether the caller can correct the request and try again
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RejectionReason::SigningFailure | RejectionReason::InternalComputationError
        )
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OpQuoteError {
    /// Map this error onto the caller-facing rejection taxonomy
    pub fn rejection_reason(&self) -> RejectionReason {
        match self {
            OpQuoteError::ProofOfWork(_) => RejectionReason::InvalidProofOfWork,
            OpQuoteError::Pricing(err) => match err {
                PricingError::UnknownWorkload(_) => RejectionReason::UnknownWorkload,
                PricingError::UnknownResourceKind(_) => RejectionReason::UnknownResourceKind,
                PricingError::InvalidTtl { .. } => RejectionReason::InvalidRequest,
                PricingError::CapacityExceeded { .. } => RejectionReason::InsufficientCapacity,
                PricingError::Computation(_) => RejectionReason::InternalComputationError,
            },
            OpQuoteError::Security(SecurityError::InvalidRange { .. }) => {
                RejectionReason::InvalidSecurityRange
            }
            OpQuoteError::Security(SecurityError::InvalidCurve(_)) => {
                RejectionReason::InternalComputationError
            }
            OpQuoteError::Crypto(_) => RejectionReason::SigningFailure,
            OpQuoteError::Serialization(_) => RejectionReason::InvalidRequest,
            OpQuoteError::Storage(_) | OpQuoteError::Config(_) | OpQuoteError::Internal(_) => {
                RejectionReason::InternalComputationError
            }
        }
    }

    /// Whether the error is a caller-correctable rejection
    pub fn is_recoverable(&self) -> bool {
        self.rejection_reason().is_recoverable()
    }
}

// Implement From for common external error types
impl From<serde_json::Error> for OpQuoteError {
    fn from(err: serde_json::Error) -> Self {
        OpQuoteError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for OpQuoteError {
    fn from(err: std::io::Error) -> Self {
        OpQuoteError::Storage(err.to_string())
    }
}
