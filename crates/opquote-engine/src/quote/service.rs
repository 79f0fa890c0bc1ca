//! Quote pipeline
//!
//! ```text
//! Received → PoWVerified → BenchmarkLoaded → CommitmentBuilt → PriceComputed → Signed → Responded
//!     └──────────────┴───────────────┴───────────────┴───────────────┴──────────┴→ Rejected(reason)
//! ```
//! The commitment is chosen before pricing because the security adjustment
//! depends on the committed exposure. A request that fails admission never
//! reaches the benchmark cache.

use std::sync::Arc;

use opquote_common::{
    OpQuoteError, PricingError, QuoteDetails, QuoteRequest, QuoteSigner, RejectionReason, Result,
    SignedQuote, DEFAULT_QUOTE_VALIDITY_SECS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::benchmark::BenchmarkCache;
use crate::config::DEFAULT_MAX_TTL_BLOCKS;
use crate::metrics::QuoteMetrics;
use crate::pow::{PowSettings, ProofOfWorkChallenge, ProofOfWorkGate};
use crate::pricing::{PriceCalculator, PricingConfigResolver};
use crate::security::SecurityCommitmentBuilder;

/// Per-request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteState {
    Received,
    PoWVerified,
    BenchmarkLoaded,
    CommitmentBuilt,
    PriceComputed,
    Signed,
    Responded,
    Rejected(RejectionReason),
}

impl std::fmt::Display for QuoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteState::Received => f.write_str("received"),
            QuoteState::PoWVerified => f.write_str("pow_verified"),
            QuoteState::BenchmarkLoaded => f.write_str("benchmark_loaded"),
            QuoteState::CommitmentBuilt => f.write_str("commitment_built"),
            QuoteState::PriceComputed => f.write_str("price_computed"),
            QuoteState::Signed => f.write_str("signed"),
            QuoteState::Responded => f.write_str("responded"),
            QuoteState::Rejected(reason) => write!(f, "rejected({})", reason),
        }
    }
}

/// Quote issuance policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSettings {
    /// Seconds between issue time and expiry
    pub validity_secs: u64,
    /// Longest duration one quote may cover
    pub max_ttl_blocks: u64,
    /// Reject requirements above the benchmarked capacity
    pub enforce_capacity: bool,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            validity_secs: DEFAULT_QUOTE_VALIDITY_SECS,
            max_ttl_blocks: DEFAULT_MAX_TTL_BLOCKS,
            enforce_capacity: false,
        }
    }
}

/// Issues signed price quotes
pub struct QuoteService {
    gate: Arc<ProofOfWorkGate>,
    benchmarks: Arc<dyn BenchmarkCache>,
    pricing: Arc<PricingConfigResolver>,
    calculator: PriceCalculator,
    commitments: SecurityCommitmentBuilder,
    signer: QuoteSigner,
    settings: QuoteSettings,
    metrics: Option<Arc<QuoteMetrics>>,
}

impl QuoteService {
    pub fn new(
        gate: Arc<ProofOfWorkGate>,
        benchmarks: Arc<dyn BenchmarkCache>,
        pricing: Arc<PricingConfigResolver>,
        calculator: PriceCalculator,
        commitments: SecurityCommitmentBuilder,
        signer: QuoteSigner,
        settings: QuoteSettings,
    ) -> Self {
        info!(
            operator = %signer.operator_did(),
            validity_secs = settings.validity_secs,
            difficulty_bits = gate.settings().difficulty_bits,
            "Quote service initialized"
        );
        Self {
            gate,
            benchmarks,
            pricing,
            calculator,
            commitments,
            signer,
            settings,
            metrics: None,
        }
    }

    /// Record request outcomes on `metrics`
    pub fn with_metrics(mut self, metrics: Arc<QuoteMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn signer(&self) -> &QuoteSigner {
        &self.signer
    }

    pub fn benchmarks(&self) -> &Arc<dyn BenchmarkCache> {
        &self.benchmarks
    }

    pub fn pricing(&self) -> &Arc<PricingConfigResolver> {
        &self.pricing
    }

    pub fn settings(&self) -> &QuoteSettings {
        &self.settings
    }

    pub fn pow_settings(&self) -> &PowSettings {
        self.gate.settings()
    }

    /// Current proof-of-work challenge for a workload
    pub fn challenge(&self, workload_id: u64) -> ProofOfWorkChallenge {
        self.challenge_at(workload_id, unix_now())
    }

    pub fn challenge_at(&self, workload_id: u64, now: u64) -> ProofOfWorkChallenge {
        self.gate.challenge(workload_id, now)
    }

    /// Issue a quote against the wall clock
    pub fn get_price(&self, request: &QuoteRequest) -> Result<SignedQuote> {
        self.get_price_at(request, unix_now())
    }

    /// Issue a quote as of `now` (unix seconds)
    #[instrument(
        skip(self, request),
        fields(workload_id = request.workload_id, ttl_blocks = request.ttl_blocks)
    )]
    pub fn get_price_at(&self, request: &QuoteRequest, now: u64) -> Result<SignedQuote> {
        let timer = self
            .metrics
            .as_ref()
            .map(|m| m.quote_duration_seconds.start_timer());
        if let Some(metrics) = &self.metrics {
            metrics.requests_total.inc();
        }

        let result = self.process(request, now);

        match &result {
            Ok(quote) => {
                debug!(
                    state = %QuoteState::Responded,
                    total_cost_rate = %quote.quote_details.total_cost_rate,
                    expiry = quote.quote_details.expiry,
                    "Quote issued"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.quotes_issued_total.inc();
                }
            }
            Err(err) => {
                let reason = err.rejection_reason();
                let state = QuoteState::Rejected(reason);
                if reason.is_recoverable() {
                    warn!(state = %state, error = %err, "Quote request rejected");
                } else {
                    error!(state = %state, error = %err, "Quote request failed");
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(reason);
                }
            }
        }

        if let Some(timer) = timer {
            timer.observe_duration();
        }
        result
    }

    fn process(&self, request: &QuoteRequest, now: u64) -> Result<SignedQuote> {
        debug!(state = %QuoteState::Received, "Quote request received");

        // Admission gates everything else
        let challenge = self
            .gate
            .admit(request.workload_id, &request.proof_of_work, now)?;
        debug!(
            state = %QuoteState::PoWVerified,
            window_start = challenge.window_start,
            "Proof of work verified"
        );

        if request.ttl_blocks == 0 || request.ttl_blocks > self.settings.max_ttl_blocks {
            return Err(PricingError::InvalidTtl {
                ttl_blocks: request.ttl_blocks,
                max_ttl_blocks: self.settings.max_ttl_blocks,
            }
            .into());
        }

        let profile = self
            .benchmarks
            .get(request.workload_id)
            .ok_or(PricingError::UnknownWorkload(request.workload_id))?;
        debug!(
            state = %QuoteState::BenchmarkLoaded,
            measured_at = profile.measured_at,
            "Benchmark profile loaded"
        );

        if self.settings.enforce_capacity {
            profile.check_capacity(&request.resource_requirements)?;
        }

        let commitment = self.commitments.build(&request.security_requirements)?;
        debug!(
            state = %QuoteState::CommitmentBuilt,
            exposure_percent = commitment.exposure_percent,
            "Security commitment built"
        );

        let table = self.pricing.resolve(request.workload_id);
        let computation = self.calculator.compute(
            &request.resource_requirements,
            &table,
            request.ttl_blocks,
            &commitment,
        )?;
        debug!(
            state = %QuoteState::PriceComputed,
            total_cost_rate = %computation.total_cost_rate,
            "Price computed"
        );

        let expiry = now.checked_add(self.settings.validity_secs).ok_or_else(|| {
            OpQuoteError::Internal(format!("quote expiry overflows at timestamp {}", now))
        })?;

        let details = QuoteDetails {
            workload_id: request.workload_id,
            ttl_blocks: request.ttl_blocks,
            total_cost_rate: computation.total_cost_rate,
            timestamp: now,
            expiry,
            resources: computation.breakdown,
            security_commitment: commitment,
        };

        let signed = self.signer.sign(details, request.proof_of_work.clone())?;
        debug!(state = %QuoteState::Signed, "Quote signed");

        Ok(signed)
    }
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
