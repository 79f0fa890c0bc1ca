//! Resource Types - what a workload asks for and what it costs
//!
//! A [`ResourceRequirement`] is a requested quantity of one resource kind.
//! A [`ResourcePricing`] is the operator's per-unit rate for that kind, with
//! the quantity it applies to.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of resources an operator prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "MemoryMB")]
    MemoryMb,
    #[serde(rename = "StorageMB")]
    StorageMb,
    #[serde(rename = "NetworkEgressMB")]
    NetworkEgressMb,
    #[serde(rename = "NetworkIngressMB")]
    NetworkIngressMb,
    #[serde(rename = "GPU")]
    Gpu,
}

impl ResourceKind {
    /// All kinds, in canonical tag order
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Cpu,
        ResourceKind::MemoryMb,
        ResourceKind::StorageMb,
        ResourceKind::NetworkEgressMb,
        ResourceKind::NetworkIngressMb,
        ResourceKind::Gpu,
    ];

    /// Tag byte used by the canonical quote encoding
    pub fn tag(&self) -> u8 {
        match self {
            ResourceKind::Cpu => 0,
            ResourceKind::MemoryMb => 1,
            ResourceKind::StorageMb => 2,
            ResourceKind::NetworkEgressMb => 3,
            ResourceKind::NetworkIngressMb => 4,
            ResourceKind::Gpu => 5,
        }
    }

    /// Inverse of [`ResourceKind::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "CPU",
            ResourceKind::MemoryMb => "MemoryMB",
            ResourceKind::StorageMb => "StorageMB",
            ResourceKind::NetworkEgressMb => "NetworkEgressMB",
            ResourceKind::NetworkIngressMb => "NetworkIngressMB",
            ResourceKind::Gpu => "GPU",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// Requested quantity of one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub kind: ResourceKind,
    pub count: u64,
}

impl ResourceRequirement {
    pub fn new(kind: ResourceKind, count: u64) -> Self {
        Self { kind, count }
    }
}

/// Operator rate for one resource kind at a given quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePricing {
    pub kind: ResourceKind,
    /// Quantity this entry applies to (the default offering in pricing tables,
    /// the requested amount in quote breakdowns)
    pub count: u64,
    /// Price per unit per second of service
    pub price_per_unit_rate: Decimal,
}

impl ResourcePricing {
    pub fn new(kind: ResourceKind, count: u64, price_per_unit_rate: Decimal) -> Self {
        Self {
            kind,
            count,
            price_per_unit_rate,
        }
    }

    /// Cost of `count` units at this rate, `None` on overflow
    pub fn cost(&self) -> Option<Decimal> {
        Decimal::from(self.count).checked_mul(self.price_per_unit_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ResourceKind::from_tag(6), None);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("cpu".parse::<ResourceKind>(), Ok(ResourceKind::Cpu));
        assert_eq!(
            "NetworkEgressMB".parse::<ResourceKind>(),
            Ok(ResourceKind::NetworkEgressMb)
        );
        assert!("TPU".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&ResourceKind::MemoryMb).unwrap();
        assert_eq!(json, "\"MemoryMB\"");
        let kind: ResourceKind = serde_json::from_str("\"GPU\"").unwrap();
        assert_eq!(kind, ResourceKind::Gpu);
    }

    #[test]
    fn test_pricing_cost() {
        let pricing = ResourcePricing::new(ResourceKind::MemoryMb, 1024, dec!(0.00005));
        assert_eq!(pricing.cost(), Some(dec!(0.0512)));
    }
}
