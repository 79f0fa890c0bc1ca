//! Security commitment selection
//!
//! Turns a caller's exposure range into the single exposure percentage the
//! operator commits to in the quote.

use std::str::FromStr;

use opquote_common::{AssetSecurityCommitment, AssetSecurityRequirement, SecurityError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the operator picks an exposure inside the caller's range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentPolicy {
    /// Lowest exposure that satisfies the range
    #[default]
    Minimum,
    /// Highest exposure the caller accepts
    Maximum,
    /// Midpoint of the range, rounded down
    Midpoint,
    /// Operator's preferred exposure, clamped into the range
    Preferred(u8),
}

impl CommitmentPolicy {
    fn pick(&self, minimum: u8, maximum: u8) -> u8 {
        match self {
            CommitmentPolicy::Minimum => minimum,
            CommitmentPolicy::Maximum => maximum,
            CommitmentPolicy::Midpoint => minimum + (maximum - minimum) / 2,
            CommitmentPolicy::Preferred(p) => (*p).clamp(minimum, maximum),
        }
    }
}

impl std::fmt::Display for CommitmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitmentPolicy::Minimum => f.write_str("minimum"),
            CommitmentPolicy::Maximum => f.write_str("maximum"),
            CommitmentPolicy::Midpoint => f.write_str("midpoint"),
            CommitmentPolicy::Preferred(p) => write!(f, "preferred:{}", p),
        }
    }
}

impl FromStr for CommitmentPolicy {
    type Err = String;

    /// Accepts `minimum`, `maximum`, `midpoint` or `preferred:<percent>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "minimum" | "min" => Ok(CommitmentPolicy::Minimum),
            "maximum" | "max" => Ok(CommitmentPolicy::Maximum),
            "midpoint" | "mid" => Ok(CommitmentPolicy::Midpoint),
            other => other
                .strip_prefix("preferred:")
                .and_then(|p| p.parse::<u8>().ok())
                .map(CommitmentPolicy::Preferred)
                .ok_or_else(|| format!("unknown commitment policy: {}", s)),
        }
    }
}

/// Builds exposure commitments under a fixed policy
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityCommitmentBuilder {
    policy: CommitmentPolicy,
}

impl SecurityCommitmentBuilder {
    pub fn new(policy: CommitmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CommitmentPolicy {
        self.policy
    }

    /// Commitment for `requirement`
    pub fn build(
        &self,
        requirement: &AssetSecurityRequirement,
    ) -> Result<AssetSecurityCommitment, SecurityError> {
        requirement.validate()?;

        let exposure_percent = self.policy.pick(
            requirement.minimum_exposure_percent,
            requirement.maximum_exposure_percent,
        );
        debug!(
            asset = %requirement.asset,
            exposure_percent,
            policy = %self.policy,
            "Security commitment built"
        );

        Ok(AssetSecurityCommitment {
            asset: requirement.asset,
            exposure_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opquote_common::Asset;
    use proptest::prelude::*;

    fn requirement(min: u8, max: u8) -> AssetSecurityRequirement {
        AssetSecurityRequirement::new(Asset::Custom(5), min, max)
    }

    #[test]
    fn test_policies() {
        let req = requirement(20, 51);
        let pick = |policy: CommitmentPolicy| {
            SecurityCommitmentBuilder::new(policy)
                .build(&req)
                .unwrap()
                .exposure_percent
        };

        assert_eq!(pick(CommitmentPolicy::Minimum), 20);
        assert_eq!(pick(CommitmentPolicy::Maximum), 51);
        assert_eq!(pick(CommitmentPolicy::Midpoint), 35);
        assert_eq!(pick(CommitmentPolicy::Preferred(40)), 40);
        assert_eq!(pick(CommitmentPolicy::Preferred(5)), 20);
        assert_eq!(pick(CommitmentPolicy::Preferred(90)), 51);
    }

    #[test]
    fn test_commitment_keeps_asset() {
        let req = AssetSecurityRequirement::new(Asset::Erc20([0xAB; 20]), 10, 10);
        let commitment = SecurityCommitmentBuilder::default().build(&req).unwrap();
        assert_eq!(commitment.asset, Asset::Erc20([0xAB; 20]));
        assert_eq!(commitment.exposure_percent, 10);
    }

    #[test]
    fn test_invalid_ranges() {
        let builder = SecurityCommitmentBuilder::default();
        assert_eq!(
            builder.build(&requirement(60, 40)),
            Err(SecurityError::InvalidRange {
                minimum: 60,
                maximum: 40
            })
        );
        assert!(builder.build(&requirement(50, 101)).is_err());
        assert!(builder.build(&requirement(0, 100)).is_ok());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("minimum".parse::<CommitmentPolicy>(), Ok(CommitmentPolicy::Minimum));
        assert_eq!("MAX".parse::<CommitmentPolicy>(), Ok(CommitmentPolicy::Maximum));
        assert_eq!("midpoint".parse::<CommitmentPolicy>(), Ok(CommitmentPolicy::Midpoint));
        assert_eq!("preferred:35".parse::<CommitmentPolicy>(), Ok(CommitmentPolicy::Preferred(35)));
        assert!("preferred:abc".parse::<CommitmentPolicy>().is_err());
        assert!("random".parse::<CommitmentPolicy>().is_err());
        assert_eq!(CommitmentPolicy::Preferred(35).to_string(), "preferred:35");
    }

    fn any_policy() -> impl Strategy<Value = CommitmentPolicy> {
        prop_oneof![
            Just(CommitmentPolicy::Minimum),
            Just(CommitmentPolicy::Maximum),
            Just(CommitmentPolicy::Midpoint),
            any::<u8>().prop_map(CommitmentPolicy::Preferred),
        ]
    }

    proptest! {
        #[test]
        fn prop_commitment_within_bounds(
            a in 0u8..=100,
            b in 0u8..=100,
            policy in any_policy(),
        ) {
            let req = requirement(a.min(b), a.max(b));
            let commitment = SecurityCommitmentBuilder::new(policy).build(&req).unwrap();
            prop_assert!(req.is_satisfied_by(&commitment));
        }

        #[test]
        fn prop_inverted_range_rejected(a in 0u8..=100, b in 0u8..=100, policy in any_policy()) {
            prop_assume!(a != b);
            let req = requirement(a.max(b), a.min(b));
            let rejected = matches!(
                SecurityCommitmentBuilder::new(policy).build(&req),
                Err(SecurityError::InvalidRange { .. })
            );
            prop_assert!(rejected);
        }
    }
}
