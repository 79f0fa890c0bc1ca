//! Pricing: rate tables, per-workload overrides and the price formula

pub mod calculator;
pub mod config;

pub use calculator::{PriceCalculator, PriceComputation, SecurityAdjustmentCurve, SecurityTier};
pub use config::{PricingConfig, PricingConfigResolver, PricingTable};
