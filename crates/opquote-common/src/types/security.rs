//! Security Types - exposure requirements and commitments
//!
//! A caller states, per asset, the range of stake exposure it will accept.
//! The operator answers with a single exposure percentage inside that range.

use serde::{Deserialize, Serialize};

use crate::error::SecurityError;
use crate::MAX_EXPOSURE_PERCENT;

/// Asset backing a service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// Chain-native asset identified by a numeric id
    Custom(u64),
    /// ERC20-style token identified by its 20-byte address
    Erc20(#[serde(with = "address_hex")] [u8; 20]),
}

impl Asset {
    /// Tag byte used by the canonical quote encoding
    pub fn tag(&self) -> u8 {
        match self {
            Asset::Custom(_) => 0,
            Asset::Erc20(_) => 1,
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Custom(id) => write!(f, "custom:{}", id),
            Asset::Erc20(address) => write!(f, "erc20:0x{}", hex::encode(address)),
        }
    }
}

/// Serde helper for 20-byte addresses as 0x-prefixed hex
mod address_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 20], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 20], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = s.strip_prefix("0x").unwrap_or(&s);
        let vec = hex::decode(raw).map_err(serde::de::Error::custom)?;
        if vec.len() != 20 {
            return Err(serde::de::Error::custom(format!(
                "expected 20 bytes, got {}",
                vec.len()
            )));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&vec);
        Ok(arr)
    }
}

/// Caller's exposure bounds for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSecurityRequirement {
    pub asset: Asset,
    pub minimum_exposure_percent: u8,
    pub maximum_exposure_percent: u8,
}

impl AssetSecurityRequirement {
    pub fn new(asset: Asset, minimum_exposure_percent: u8, maximum_exposure_percent: u8) -> Self {
        Self {
            asset,
            minimum_exposure_percent,
            maximum_exposure_percent,
        }
    }

    /// Check `minimum <= maximum` and both within `[0, 100]`
    pub fn validate(&self) -> Result<(), SecurityError> {
        if self.minimum_exposure_percent > self.maximum_exposure_percent
            || self.maximum_exposure_percent > MAX_EXPOSURE_PERCENT
        {
            return Err(SecurityError::InvalidRange {
                minimum: self.minimum_exposure_percent,
                maximum: self.maximum_exposure_percent,
            });
        }
        Ok(())
    }

    /// Whether a commitment honours this requirement
    pub fn is_satisfied_by(&self, commitment: &AssetSecurityCommitment) -> bool {
        commitment.asset == self.asset
            && commitment.exposure_percent >= self.minimum_exposure_percent
            && commitment.exposure_percent <= self.maximum_exposure_percent
    }
}

/// Operator's binding exposure promise for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSecurityCommitment {
    pub asset: Asset,
    pub exposure_percent: u8,
}
