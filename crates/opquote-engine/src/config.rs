//! Engine configuration

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use opquote_common::{BLOCK_TIME_SECONDS, DEFAULT_QUOTE_VALIDITY_SECS};
use serde::{Deserialize, Serialize};

use crate::pow::PowSettings;
use crate::pricing::SecurityAdjustmentCurve;
use crate::quote::QuoteSettings;
use crate::security::CommitmentPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "OPQUOTE_";

/// Default maximum quoted duration in blocks
pub const DEFAULT_MAX_TTL_BLOCKS: u64 = 1_000_000;

/// Pricing engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub server: ServerSettings,
    pub pricing: PricingSettings,
    pub proof_of_work: PowSettings,
    pub quote: IssuanceSettings,
    pub security: SecuritySettings,
}

impl EngineConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut cfg = Self::default();

        // Platform-provided PORT first, prefixed variable wins
        if let Some(port) = parse_opt::<u16>("PORT", lookup("PORT"))? {
            cfg.server.port = port;
        }
        if let Some(host) = var("HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = parse_opt("OPQUOTE_PORT", var("PORT"))? {
            cfg.server.port = port;
        }
        if let Some(key) = var("SIGNING_KEY") {
            cfg.server.signing_key_hex = Some(key);
        }
        if let Some(path) = var("PRICING_FILE") {
            cfg.server.pricing_file = Some(PathBuf::from(path));
        }
        if let Some(path) = var("BENCHMARK_FILE") {
            cfg.server.benchmark_file = Some(PathBuf::from(path));
        }

        // Pricing settings
        if let Some(v) = parse_opt("OPQUOTE_BLOCK_TIME_SECS", var("BLOCK_TIME_SECS"))? {
            cfg.pricing.block_time_seconds = v;
        }
        if let Some(v) = parse_opt("OPQUOTE_MAX_TTL_BLOCKS", var("MAX_TTL_BLOCKS"))? {
            cfg.pricing.max_ttl_blocks = v;
        }
        if let Some(v) = parse_opt("OPQUOTE_ENFORCE_CAPACITY", var("ENFORCE_CAPACITY"))? {
            cfg.pricing.enforce_capacity = v;
        }

        // Proof-of-work settings
        if let Some(v) = parse_opt("OPQUOTE_POW_DIFFICULTY", var("POW_DIFFICULTY"))? {
            cfg.proof_of_work.difficulty_bits = v;
        }
        if let Some(v) = parse_opt("OPQUOTE_POW_WINDOW_SECS", var("POW_WINDOW_SECS"))? {
            cfg.proof_of_work.window_secs = v;
            cfg.proof_of_work.sweep_interval_secs = v;
        }

        // Quote settings
        if let Some(v) = parse_opt("OPQUOTE_QUOTE_VALIDITY_SECS", var("QUOTE_VALIDITY_SECS"))? {
            cfg.quote.validity_secs = v;
        }

        // Security settings
        if let Some(policy) = var("COMMITMENT_POLICY") {
            cfg.security.commitment_policy = policy
                .parse::<CommitmentPolicy>()
                .map_err(anyhow::Error::msg)?;
        }
        if let Some(curve) = var("SECURITY_CURVE") {
            cfg.security.curve = serde_json::from_str(&curve)
                .context("OPQUOTE_SECURITY_CURVE is not a valid adjustment curve")?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pricing.block_time_seconds == 0 {
            bail!("block time must be positive");
        }
        if self.pricing.max_ttl_blocks == 0 {
            bail!("max ttl blocks must be positive");
        }
        if self.proof_of_work.window_secs == 0 {
            bail!("proof-of-work window must be positive");
        }
        if self.proof_of_work.difficulty_bits > 64 {
            bail!(
                "proof-of-work difficulty {} exceeds 64 bits",
                self.proof_of_work.difficulty_bits
            );
        }
        if self.quote.validity_secs == 0 {
            bail!("quote validity must be positive");
        }
        self.security.curve.validate()?;
        Ok(())
    }

    /// Settings for the quote service
    pub fn quote_settings(&self) -> QuoteSettings {
        QuoteSettings {
            validity_secs: self.quote.validity_secs,
            max_ttl_blocks: self.pricing.max_ttl_blocks,
            enforce_capacity: self.pricing.enforce_capacity,
        }
    }

    /// Socket address string for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_opt<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid value {:?} for {}: {}", raw, name, e))
        })
        .transpose()
}

/// Listener and collaborator sources
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Hex-encoded Ed25519 secret; an ephemeral key is generated when absent
    #[serde(skip_serializing)]
    pub signing_key_hex: Option<String>,
    /// JSON pricing document
    pub pricing_file: Option<PathBuf>,
    /// JSON benchmark snapshot; in-memory only when absent
    pub benchmark_file: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            signing_key_hex: None,
            pricing_file: None,
            benchmark_file: None,
        }
    }
}

impl std::fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "signing_key_hex",
                &self.signing_key_hex.as_ref().map(|_| "<redacted>"),
            )
            .field("pricing_file", &self.pricing_file)
            .field("benchmark_file", &self.benchmark_file)
            .finish()
    }
}

/// Pricing formula settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSettings {
    pub block_time_seconds: u64,
    /// Longest duration a single quote may cover
    pub max_ttl_blocks: u64,
    /// Reject requirements above the benchmarked capacity
    pub enforce_capacity: bool,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            block_time_seconds: BLOCK_TIME_SECONDS,
            max_ttl_blocks: DEFAULT_MAX_TTL_BLOCKS,
            enforce_capacity: false,
        }
    }
}

/// Quote issuance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceSettings {
    /// Seconds between a quote's timestamp and its expiry
    pub validity_secs: u64,
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            validity_secs: DEFAULT_QUOTE_VALIDITY_SECS,
        }
    }
}

/// Security commitment settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub commitment_policy: CommitmentPolicy,
    pub curve: SecurityAdjustmentCurve,
}
