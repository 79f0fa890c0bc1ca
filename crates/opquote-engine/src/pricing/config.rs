//! Pricing configuration and per-workload override resolution
//!
//! A [`PricingConfig`] holds the operator's default rate table and optional
//! per-workload tables. Resolution is entry-wise: an override entry replaces
//! the default entry of the same kind, every other kind keeps its default.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use opquote_common::{OpQuoteError, PricingError, ResourceKind, ResourcePricing, Result};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Rate table keyed by resource kind
///
/// Serialized as a list of entries; a kind may appear at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ResourcePricing>", into = "Vec<ResourcePricing>")]
pub struct PricingTable {
    entries: BTreeMap<ResourceKind, ResourcePricing>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for a kind
    pub fn with_entry(mut self, pricing: ResourcePricing) -> Self {
        self.insert(pricing);
        self
    }

    pub fn insert(&mut self, pricing: ResourcePricing) -> Option<ResourcePricing> {
        self.entries.insert(pricing.kind, pricing)
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourcePricing> {
        self.entries.get(&kind)
    }

    /// Entry for a kind; a missing kind is an error, never a zero price
    pub fn rate_for(&self, kind: ResourceKind) -> std::result::Result<&ResourcePricing, PricingError> {
        self.get(kind)
            .ok_or_else(|| PricingError::UnknownResourceKind(kind.to_string()))
    }

    /// Entries in canonical kind order
    pub fn entries(&self) -> impl Iterator<Item = &ResourcePricing> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay `overrides` on top of this table
    pub fn merged_with(&self, overrides: &PricingTable) -> PricingTable {
        let mut merged = self.clone();
        for entry in overrides.entries() {
            merged.insert(entry.clone());
        }
        merged
    }

    fn validate(&self, label: &str) -> Result<()> {
        for entry in self.entries() {
            if entry.price_per_unit_rate < Decimal::ZERO {
                return Err(OpQuoteError::Config(format!(
                    "{} table: negative rate {} for {}",
                    label, entry.price_per_unit_rate, entry.kind
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<Vec<ResourcePricing>> for PricingTable {
    type Error = String;

    fn try_from(entries: Vec<ResourcePricing>) -> std::result::Result<Self, Self::Error> {
        let mut table = PricingTable::new();
        for entry in entries {
            let kind = entry.kind;
            if table.insert(entry).is_some() {
                return Err(format!("duplicate pricing entry for {}", kind));
            }
        }
        Ok(table)
    }
}

impl From<PricingTable> for Vec<ResourcePricing> {
    fn from(table: PricingTable) -> Self {
        table.entries.into_values().collect()
    }
}

/// Operator pricing configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Rates applied to every workload
    pub default: PricingTable,
    /// Per-workload replacements, keyed by workload id
    #[serde(default)]
    pub overrides: HashMap<u64, PricingTable>,
}

impl PricingConfig {
    pub fn new(default: PricingTable) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Set the override table for a workload
    pub fn with_override(mut self, workload_id: u64, table: PricingTable) -> Self {
        self.overrides.insert(workload_id, table);
        self
    }

    /// Parse an already-loaded JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: PricingConfig = serde_json::from_str(content)
            .map_err(|e| OpQuoteError::Config(format!("Failed to parse pricing JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject negative rates anywhere in the config
    pub fn validate(&self) -> Result<()> {
        self.default.validate("default")?;
        for (workload_id, table) in &self.overrides {
            table.validate(&format!("workload {}", workload_id))?;
        }
        Ok(())
    }

    /// Built-in rate table used when no pricing document is supplied
    pub fn builtin() -> Self {
        Self::new(
            PricingTable::new()
                .with_entry(ResourcePricing::new(ResourceKind::Cpu, 1, dec!(0.001)))
                .with_entry(ResourcePricing::new(ResourceKind::MemoryMb, 1024, dec!(0.00005)))
                .with_entry(ResourcePricing::new(ResourceKind::StorageMb, 10_240, dec!(0.00002)))
                .with_entry(ResourcePricing::new(
                    ResourceKind::NetworkEgressMb,
                    1024,
                    dec!(0.00003),
                ))
                .with_entry(ResourcePricing::new(
                    ResourceKind::NetworkIngressMb,
                    1024,
                    dec!(0.00001),
                ))
                .with_entry(ResourcePricing::new(ResourceKind::Gpu, 0, dec!(0.005))),
        )
    }
}

/// Resolves the effective rate table for a workload
///
/// The config is swapped wholesale on reload; in-flight requests keep the
/// snapshot they resolved against.
pub struct PricingConfigResolver {
    config: RwLock<Arc<PricingConfig>>,
}

impl PricingConfigResolver {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Effective table for a workload
    pub fn resolve(&self, workload_id: u64) -> PricingTable {
        let config = self.snapshot();
        match config.overrides.get(&workload_id) {
            Some(overrides) => {
                debug!(workload_id, entries = overrides.len(), "Applying pricing override");
                config.default.merged_with(overrides)
            }
            None => config.default.clone(),
        }
    }

    /// Replace the config after validating it
    pub fn reload(&self, config: PricingConfig) -> Result<()> {
        config.validate()?;
        let overrides = config.overrides.len();
        *self.config.write() = Arc::new(config);
        info!(overrides, "Pricing config reloaded");
        Ok(())
    }

    /// Current config
    pub fn snapshot(&self) -> Arc<PricingConfig> {
        self.config.read().clone()
    }
}
