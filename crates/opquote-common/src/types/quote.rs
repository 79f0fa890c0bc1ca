//! Quote Types - request, unsigned body, and signed result
//!
//! Quotes are stateless artifacts: they are built per request, carry their own
//! expiry, and are never stored by the operator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::resource::{ResourcePricing, ResourceRequirement};
use crate::types::security::{AssetSecurityCommitment, AssetSecurityRequirement};

/// Request for a signed price quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Workload (blueprint) being priced
    pub workload_id: u64,
    /// Requested service duration in blocks
    pub ttl_blocks: u64,
    /// Proof-of-work admission proof
    #[serde(with = "hex_bytes")]
    pub proof_of_work: Vec<u8>,
    /// Requested resources; empty means the operator's default offering
    #[serde(default)]
    pub resource_requirements: Vec<ResourceRequirement>,
    /// Caller's exposure bounds
    pub security_requirements: AssetSecurityRequirement,
}

/// Unsigned quote body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub workload_id: u64,
    pub ttl_blocks: u64,
    /// Σ resource costs × ttl adjustment × security adjustment
    pub total_cost_rate: Decimal,
    /// Issue time (unix seconds)
    pub timestamp: u64,
    /// Expiry time (unix seconds), strictly after `timestamp`
    pub expiry: u64,
    /// Per-resource breakdown, in request order
    pub resources: Vec<ResourcePricing>,
    pub security_commitment: AssetSecurityCommitment,
}

impl QuoteDetails {
    /// Check if the quote is still valid at `now`
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expiry
    }

    /// Check if the quote is still valid
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp().max(0) as u64)
    }

    /// Remaining validity in seconds at `now`
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.expiry.saturating_sub(now)
    }
}

/// Signed quote, ready to hand back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedQuote {
    pub quote_details: QuoteDetails,
    /// Ed25519 signature over the canonical quote hash
    #[serde(with = "hex_array")]
    pub signature: [u8; 64],
    /// Operator Ed25519 public key
    #[serde(with = "hex_array")]
    pub operator_id: [u8; 32],
    /// Admission proof this quote was issued against
    #[serde(with = "hex_bytes")]
    pub proof_of_work_response: Vec<u8>,
}

/// Serde helper for byte vectors as hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for fixed-size byte arrays as hex strings
pub mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let vec = hex::decode(s.strip_prefix("0x").unwrap_or(&s))
            .map_err(serde::de::Error::custom)?;
        if vec.len() != N {
            return Err(serde::de::Error::custom(format!(
                "expected {} bytes, got {}",
                N,
                vec.len()
            )));
        }
        let mut arr = [0u8; N];
        arr.copy_from_slice(&vec);
        Ok(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::resource::ResourceKind;
    use crate::types::security::Asset;
    use rust_decimal_macros::dec;

    fn sample_details() -> QuoteDetails {
        QuoteDetails {
            workload_id: 9,
            ttl_blocks: 100,
            total_cost_rate: dec!(31.92),
            timestamp: 1_000,
            expiry: 1_300,
            resources: vec![ResourcePricing::new(ResourceKind::Cpu, 2, dec!(0.001))],
            security_commitment: AssetSecurityCommitment {
                asset: Asset::Custom(1),
                exposure_percent: 20,
            },
        }
    }

    #[test]
    fn test_quote_validity_window() {
        let details = sample_details();
        assert!(details.is_valid_at(1_000));
        assert!(details.is_valid_at(1_299));
        assert!(!details.is_valid_at(1_300));
        assert_eq!(details.remaining_secs(1_100), 200);
        assert_eq!(details.remaining_secs(2_000), 0);
    }

    #[test]
    fn test_signed_quote_json_roundtrip() {
        let signed = SignedQuote {
            quote_details: sample_details(),
            signature: [7u8; 64],
            operator_id: [3u8; 32],
            proof_of_work_response: vec![0, 1, 2, 3],
        };

        let json = serde_json::to_string(&signed).unwrap();
        assert!(json.contains("\"proof_of_work_response\":\"00010203\""));

        let back: SignedQuote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signed);
    }

    #[test]
    fn test_request_defaults_empty_requirements() {
        let json = r#"{
            "workload_id": 5,
            "ttl_blocks": 10,
            "proof_of_work": "0x00ff",
            "security_requirements": {
                "asset": {"custom": 1},
                "minimum_exposure_percent": 10,
                "maximum_exposure_percent": 30
            }
        }"#;
        let request: QuoteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.proof_of_work, vec![0x00, 0xff]);
        assert!(request.resource_requirements.is_empty());
    }
}
