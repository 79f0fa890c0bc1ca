//! # Opquote Engine
//!
//! Operator-side pricing engine: admits quote requests behind a
//! proof-of-work gate, prices them from benchmark profiles and a rate table,
//! and returns Ed25519-signed quotes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            REST (axum)  /  PricingService (gRPC)         │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//! ┌────────────────────────────┴─────────────────────────────┐
//! │                       QuoteService                       │
//! │  ProofOfWorkGate → BenchmarkCache → CommitmentBuilder    │
//! │        → PriceCalculator (PricingConfigResolver)         │
//! │        → QuoteSigner                                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Shared state (benchmark cache, pricing config, consumed proofs) is owned
//! by the components and passed around in `Arc`s; nothing is global.

pub mod api;
pub mod benchmark;
pub mod config;
pub mod generated;
pub mod grpc;
pub mod metrics;
pub mod pow;
pub mod pricing;
pub mod quote;
pub mod security;

// Re-export core types
pub use benchmark::{BenchmarkCache, InMemoryBenchmarkCache, PersistentBenchmarkCache};
pub use config::EngineConfig;
pub use metrics::QuoteMetrics;
pub use pow::{PowSettings, ProofOfWorkChallenge, ProofOfWorkGate, ProofOfWorkProof};
pub use pricing::{
    PriceCalculator, PriceComputation, PricingConfig, PricingConfigResolver, PricingTable,
    SecurityAdjustmentCurve,
};
pub use quote::{QuoteService, QuoteSettings, QuoteState};
pub use security::{CommitmentPolicy, SecurityCommitmentBuilder};

// Re-export gRPC service
pub use grpc::{PricingGrpcService, PricingService};

// Re-export generated proto types
pub use generated::pricing::v1 as proto;
