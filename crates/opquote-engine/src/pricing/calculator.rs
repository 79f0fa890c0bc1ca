//! Quote price calculation
//!
//! Formula: `total = Σ(count × rate) × (ttl_blocks × block_time) × security_adjustment`
//!
//! All arithmetic is checked `Decimal` math. An overflow or a negative
//! intermediate aborts the computation; a quote is never priced on a
//! wrapped or clamped value.

use opquote_common::{
    AssetSecurityCommitment, PricingError, ResourcePricing, ResourceRequirement, SecurityError,
    BLOCK_TIME_SECONDS, MAX_EXPOSURE_PERCENT,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::PricingTable;

/// One step of a stepped adjustment curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityTier {
    /// Exposure at which this tier starts to apply
    pub threshold_percent: u8,
    pub multiplier: Decimal,
}

impl SecurityTier {
    pub fn new(threshold_percent: u8, multiplier: Decimal) -> Self {
        Self {
            threshold_percent,
            multiplier,
        }
    }
}

/// Maps a committed exposure percentage to a price multiplier
///
/// Every curve is monotonically non-decreasing and never drops below 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityAdjustmentCurve {
    /// No security premium
    Flat,
    /// `1 + premium_per_percent × max(0, exposure − baseline_percent)`
    Linear {
        baseline_percent: u8,
        premium_per_percent: Decimal,
    },
    /// Multiplier of the highest tier whose threshold is at or below the exposure
    Stepped { tiers: Vec<SecurityTier> },
}

impl Default for SecurityAdjustmentCurve {
    fn default() -> Self {
        SecurityAdjustmentCurve::Linear {
            baseline_percent: 20,
            premium_per_percent: dec!(0.01),
        }
    }
}

impl SecurityAdjustmentCurve {
    /// Check the curve parameters
    pub fn validate(&self) -> Result<(), SecurityError> {
        match self {
            SecurityAdjustmentCurve::Flat => Ok(()),
            SecurityAdjustmentCurve::Linear {
                baseline_percent,
                premium_per_percent,
            } => {
                if *baseline_percent > MAX_EXPOSURE_PERCENT {
                    return Err(SecurityError::InvalidCurve(format!(
                        "baseline {}% above {}%",
                        baseline_percent, MAX_EXPOSURE_PERCENT
                    )));
                }
                if premium_per_percent.is_sign_negative() {
                    return Err(SecurityError::InvalidCurve(format!(
                        "negative premium {}",
                        premium_per_percent
                    )));
                }
                Ok(())
            }
            SecurityAdjustmentCurve::Stepped { tiers } => {
                let mut previous: Option<&SecurityTier> = None;
                for tier in tiers {
                    if tier.threshold_percent == 0 && tier.multiplier != Decimal::ONE {
                        return Err(SecurityError::InvalidCurve(format!(
                            "tier at 0% must have multiplier 1, got {}",
                            tier.multiplier
                        )));
                    }
                    if tier.multiplier < Decimal::ONE {
                        return Err(SecurityError::InvalidCurve(format!(
                            "tier at {}% has multiplier {} below 1",
                            tier.threshold_percent, tier.multiplier
                        )));
                    }
                    if let Some(prev) = previous {
                        if tier.threshold_percent <= prev.threshold_percent
                            || tier.multiplier < prev.multiplier
                        {
                            return Err(SecurityError::InvalidCurve(
                                "tiers must have increasing thresholds and non-decreasing multipliers"
                                    .to_string(),
                            ));
                        }
                    }
                    previous = Some(tier);
                }
                Ok(())
            }
        }
    }

    /// Multiplier for a committed exposure
    pub fn adjustment(&self, exposure_percent: u8) -> Result<Decimal, PricingError> {
        match self {
            SecurityAdjustmentCurve::Flat => Ok(Decimal::ONE),
            SecurityAdjustmentCurve::Linear {
                baseline_percent,
                premium_per_percent,
            } => {
                let excess = exposure_percent.saturating_sub(*baseline_percent);
                premium_per_percent
                    .checked_mul(Decimal::from(excess))
                    .and_then(|premium| premium.checked_add(Decimal::ONE))
                    .ok_or_else(|| overflow("security adjustment"))
            }
            SecurityAdjustmentCurve::Stepped { tiers } => Ok(tiers
                .iter()
                .rev()
                .find(|tier| tier.threshold_percent <= exposure_percent)
                .map(|tier| tier.multiplier)
                .unwrap_or(Decimal::ONE)),
        }
    }
}

/// Result of pricing one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceComputation {
    /// Σ count × rate over the priced resources
    pub base_resource_cost: Decimal,
    /// ttl_blocks × block time in seconds
    pub ttl_adjustment: Decimal,
    pub security_adjustment: Decimal,
    pub total_cost_rate: Decimal,
    /// Priced resources with the quantity actually charged
    pub breakdown: Vec<ResourcePricing>,
}

/// Stateless price calculator
#[derive(Debug, Clone)]
pub struct PriceCalculator {
    block_time_seconds: u64,
    curve: SecurityAdjustmentCurve,
}

impl Default for PriceCalculator {
    fn default() -> Self {
        Self {
            block_time_seconds: BLOCK_TIME_SECONDS,
            curve: SecurityAdjustmentCurve::default(),
        }
    }
}

impl PriceCalculator {
    /// Calculator with a flat security curve
    pub fn new(block_time_seconds: u64) -> Self {
        Self {
            block_time_seconds,
            curve: SecurityAdjustmentCurve::Flat,
        }
    }

    /// Replace the security adjustment curve
    pub fn with_curve(mut self, curve: SecurityAdjustmentCurve) -> Result<Self, SecurityError> {
        curve.validate()?;
        self.curve = curve;
        Ok(self)
    }

    pub fn block_time_seconds(&self) -> u64 {
        self.block_time_seconds
    }

    pub fn curve(&self) -> &SecurityAdjustmentCurve {
        &self.curve
    }

    /// Price `requirements` against `table` for `ttl_blocks` at the committed exposure
    ///
    /// An empty requirement list prices the table's own entries at their
    /// configured counts.
    #[instrument(skip(self, requirements, table), fields(resources = requirements.len()))]
    pub fn compute(
        &self,
        requirements: &[ResourceRequirement],
        table: &PricingTable,
        ttl_blocks: u64,
        commitment: &AssetSecurityCommitment,
    ) -> Result<PriceComputation, PricingError> {
        let breakdown = if requirements.is_empty() {
            table.entries().cloned().collect::<Vec<_>>()
        } else {
            requirements
                .iter()
                .map(|req| {
                    let rate = table.rate_for(req.kind)?;
                    Ok(ResourcePricing::new(req.kind, req.count, rate.price_per_unit_rate))
                })
                .collect::<Result<Vec<_>, PricingError>>()?
        };

        let mut base_resource_cost = Decimal::ZERO;
        for entry in &breakdown {
            if entry.price_per_unit_rate.is_sign_negative() {
                return Err(PricingError::Computation(format!(
                    "negative rate {} for {}",
                    entry.price_per_unit_rate, entry.kind
                )));
            }
            let cost = entry
                .cost()
                .ok_or_else(|| overflow(&format!("{} resource cost", entry.kind)))?;
            base_resource_cost = base_resource_cost
                .checked_add(cost)
                .ok_or_else(|| overflow("base resource cost"))?;
        }

        let ttl_adjustment = Decimal::from(ttl_blocks)
            .checked_mul(Decimal::from(self.block_time_seconds))
            .ok_or_else(|| overflow("ttl adjustment"))?;

        let security_adjustment = self.curve.adjustment(commitment.exposure_percent)?;
        if security_adjustment < Decimal::ONE {
            return Err(PricingError::Computation(format!(
                "security adjustment {} below 1",
                security_adjustment
            )));
        }

        let total_cost_rate = base_resource_cost
            .checked_mul(ttl_adjustment)
            .and_then(|subtotal| subtotal.checked_mul(security_adjustment))
            .ok_or_else(|| overflow("total cost rate"))?;

        debug!(
            %base_resource_cost,
            %ttl_adjustment,
            %security_adjustment,
            %total_cost_rate,
            "Price computed"
        );

        Ok(PriceComputation {
            base_resource_cost,
            ttl_adjustment,
            security_adjustment,
            total_cost_rate,
            breakdown,
        })
    }
}

fn overflow(what: &str) -> PricingError {
    PricingError::Computation(format!("{} overflow", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opquote_common::{Asset, ResourceKind};
    use proptest::prelude::*;

    fn table() -> PricingTable {
        PricingTable::new()
            .with_entry(ResourcePricing::new(ResourceKind::Cpu, 1, dec!(0.001)))
            .with_entry(ResourcePricing::new(ResourceKind::MemoryMb, 1024, dec!(0.00005)))
    }

    fn commitment(exposure_percent: u8) -> AssetSecurityCommitment {
        AssetSecurityCommitment {
            asset: Asset::Custom(0),
            exposure_percent,
        }
    }

    fn example_requirements() -> Vec<ResourceRequirement> {
        vec![
            ResourceRequirement::new(ResourceKind::Cpu, 2),
            ResourceRequirement::new(ResourceKind::MemoryMb, 1024),
        ]
    }

    #[test]
    fn test_reference_quote() {
        let calc = PriceCalculator::new(6);
        let result = calc
            .compute(&example_requirements(), &table(), 100, &commitment(20))
            .unwrap();

        assert_eq!(result.base_resource_cost, dec!(0.0532));
        assert_eq!(result.ttl_adjustment, dec!(600));
        assert_eq!(result.security_adjustment, dec!(1));
        assert_eq!(result.total_cost_rate, dec!(31.92));
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[0].count, 2);
        assert_eq!(result.breakdown[1].price_per_unit_rate, dec!(0.00005));
    }

    #[test]
    fn test_default_curve_is_neutral_at_baseline() {
        let calc = PriceCalculator::default();
        let at_baseline = calc
            .compute(&example_requirements(), &table(), 100, &commitment(20))
            .unwrap();
        let above = calc
            .compute(&example_requirements(), &table(), 100, &commitment(50))
            .unwrap();

        assert_eq!(at_baseline.total_cost_rate, dec!(31.92));
        assert_eq!(above.security_adjustment, dec!(1.30));
        assert_eq!(above.total_cost_rate, dec!(41.496));
    }

    #[test]
    fn test_deterministic() {
        let calc = PriceCalculator::default();
        let a = calc
            .compute(&example_requirements(), &table(), 42, &commitment(60))
            .unwrap();
        let b = calc
            .compute(&example_requirements(), &table(), 42, &commitment(60))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let calc = PriceCalculator::new(6);
        let requirements = vec![ResourceRequirement::new(ResourceKind::Gpu, 1)];
        assert_eq!(
            calc.compute(&requirements, &table(), 10, &commitment(0)),
            Err(PricingError::UnknownResourceKind("GPU".to_string()))
        );
    }

    #[test]
    fn test_empty_requirements_price_default_offering() {
        let calc = PriceCalculator::new(6);
        let result = calc.compute(&[], &table(), 1, &commitment(0)).unwrap();

        // 1 × 0.001 + 1024 × 0.00005
        assert_eq!(result.base_resource_cost, dec!(0.0522));
        assert_eq!(result.breakdown, table().entries().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_ttl_prices_zero() {
        let calc = PriceCalculator::new(6);
        let result = calc
            .compute(&example_requirements(), &table(), 0, &commitment(0))
            .unwrap();
        assert_eq!(result.total_cost_rate, Decimal::ZERO);
    }

    #[test]
    fn test_overflow_is_computation_error() {
        let calc = PriceCalculator::new(u64::MAX);
        let huge = PricingTable::new()
            .with_entry(ResourcePricing::new(ResourceKind::Cpu, 1, Decimal::MAX));
        let requirements = vec![ResourceRequirement::new(ResourceKind::Cpu, u64::MAX)];

        assert!(matches!(
            calc.compute(&requirements, &huge, u64::MAX, &commitment(0)),
            Err(PricingError::Computation(_))
        ));
    }

    #[test]
    fn test_negative_rate_is_computation_error() {
        let calc = PriceCalculator::new(6);
        let bad = PricingTable::new()
            .with_entry(ResourcePricing::new(ResourceKind::Cpu, 1, dec!(-1)));
        let requirements = vec![ResourceRequirement::new(ResourceKind::Cpu, 1)];

        assert!(matches!(
            calc.compute(&requirements, &bad, 1, &commitment(0)),
            Err(PricingError::Computation(_))
        ));
    }

    #[test]
    fn test_stepped_curve() {
        let curve = SecurityAdjustmentCurve::Stepped {
            tiers: vec![
                SecurityTier::new(25, dec!(1.1)),
                SecurityTier::new(50, dec!(1.25)),
                SecurityTier::new(75, dec!(1.5)),
            ],
        };
        assert!(curve.validate().is_ok());
        assert_eq!(curve.adjustment(10).unwrap(), dec!(1));
        assert_eq!(curve.adjustment(25).unwrap(), dec!(1.1));
        assert_eq!(curve.adjustment(74).unwrap(), dec!(1.25));
        assert_eq!(curve.adjustment(100).unwrap(), dec!(1.5));
    }

    #[test]
    fn test_invalid_curves_rejected() {
        let decreasing = SecurityAdjustmentCurve::Stepped {
            tiers: vec![SecurityTier::new(10, dec!(1.5)), SecurityTier::new(20, dec!(1.2))],
        };
        let below_one = SecurityAdjustmentCurve::Stepped {
            tiers: vec![SecurityTier::new(10, dec!(0.9))],
        };
        let negative = SecurityAdjustmentCurve::Linear {
            baseline_percent: 0,
            premium_per_percent: dec!(-0.01),
        };
        let premium_at_zero = SecurityAdjustmentCurve::Stepped {
            tiers: vec![SecurityTier::new(0, dec!(1.5))],
        };

        for curve in [decreasing, below_one, negative, premium_at_zero] {
            assert!(matches!(
                PriceCalculator::new(6).with_curve(curve),
                Err(SecurityError::InvalidCurve(_))
            ));
        }
    }

    #[test]
    fn test_curve_serde() {
        let json = r#"{"type":"linear","baseline_percent":10,"premium_per_percent":"0.02"}"#;
        let curve: SecurityAdjustmentCurve = serde_json::from_str(json).unwrap();
        assert_eq!(
            curve,
            SecurityAdjustmentCurve::Linear {
                baseline_percent: 10,
                premium_per_percent: dec!(0.02)
            }
        );
    }

    proptest! {
        #[test]
        fn prop_pricing_is_additive(
            cpu in 0u64..1_000_000,
            mem in 0u64..1_000_000,
            ttl in 0u64..100_000,
            exposure in 0u8..=100,
        ) {
            let calc = PriceCalculator::default();
            let c = commitment(exposure);
            let both = calc
                .compute(
                    &[
                        ResourceRequirement::new(ResourceKind::Cpu, cpu),
                        ResourceRequirement::new(ResourceKind::MemoryMb, mem),
                    ],
                    &table(),
                    ttl,
                    &c,
                )
                .unwrap();
            let only_cpu = calc
                .compute(&[ResourceRequirement::new(ResourceKind::Cpu, cpu)], &table(), ttl, &c)
                .unwrap();
            let only_mem = calc
                .compute(&[ResourceRequirement::new(ResourceKind::MemoryMb, mem)], &table(), ttl, &c)
                .unwrap();

            prop_assert_eq!(
                both.base_resource_cost,
                only_cpu.base_resource_cost + only_mem.base_resource_cost
            );
            prop_assert_eq!(
                both.total_cost_rate,
                (only_cpu.base_resource_cost + only_mem.base_resource_cost)
                    * both.ttl_adjustment
                    * both.security_adjustment
            );
        }

        #[test]
        fn prop_default_curve_is_monotonic(a in 0u8..=100, b in 0u8..=100) {
            let curve = SecurityAdjustmentCurve::default();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low_adj = curve.adjustment(low).unwrap();
            prop_assert!(low_adj >= Decimal::ONE);
            prop_assert!(low_adj <= curve.adjustment(high).unwrap());
        }

        #[test]
        fn prop_valid_curves_are_neutral_at_zero(
            baseline in 0u8..=120,
            premium_bp in 0u32..=500,
            thresholds in proptest::collection::vec(0u8..=100, 0..5),
            multipliers_bp in proptest::collection::vec(0u32..=300, 0..5),
        ) {
            let mut tiers: Vec<SecurityTier> = thresholds
                .iter()
                .zip(multipliers_bp.iter())
                .map(|(threshold, bp)| {
                    SecurityTier::new(*threshold, dec!(0.5) + Decimal::new(i64::from(*bp), 2))
                })
                .collect();
            tiers.sort_by_key(|tier| tier.threshold_percent);

            let curves = [
                SecurityAdjustmentCurve::Flat,
                SecurityAdjustmentCurve::Linear {
                    baseline_percent: baseline,
                    premium_per_percent: Decimal::new(i64::from(premium_bp), 4),
                },
                SecurityAdjustmentCurve::Stepped { tiers },
            ];
            for curve in curves {
                if curve.validate().is_ok() {
                    prop_assert_eq!(curve.adjustment(0).unwrap(), Decimal::ONE);
                }
            }
        }
    }
}
