//! Canonical Quote Encoding
//!
//! Every verifier must reproduce the exact bytes the operator signed, so the
//! layout below is fixed. All integers are big-endian.
//!
//! ```text
//! "OPQUOTE/QUOTE/V1"                 16-byte domain tag
//! workload_id                        u64
//! ttl_blocks                         u64
//! total_cost_rate                    decimal
//! timestamp                          u64
//! expiry                             u64
//! resource count                     u32
//!   kind tag u8 | count u64 | price_per_unit_rate decimal   (per resource)
//! asset tag u8 | asset body | exposure_percent u8
//!
//! decimal    = normalized mantissa i128 (16 bytes) | scale u32
//! asset body = custom: u64 | erc20: 20 raw bytes
//! ```
//!
//! The quote hash is BLAKE3 over these bytes.

use rust_decimal::Decimal;

use crate::types::quote::QuoteDetails;
use crate::types::security::Asset;

/// Domain separation tag prefixed to every encoded quote
pub const QUOTE_DOMAIN_TAG: &[u8; 16] = b"OPQUOTE/QUOTE/V1";

/// Hash size in bytes (BLAKE3 output)
pub const HASH_SIZE: usize = 32;

/// Encode a decimal independent of its textual scale (`1.50` == `1.5`)
fn encode_decimal(out: &mut Vec<u8>, value: &Decimal) {
    let normalized = value.normalize();
    out.extend_from_slice(&normalized.mantissa().to_be_bytes());
    out.extend_from_slice(&normalized.scale().to_be_bytes());
}

fn encode_asset(out: &mut Vec<u8>, asset: &Asset) {
    out.push(asset.tag());
    match asset {
        Asset::Custom(id) => out.extend_from_slice(&id.to_be_bytes()),
        Asset::Erc20(address) => out.extend_from_slice(address),
    }
}

/// Canonical byte encoding of a quote body
pub fn encode_quote(details: &QuoteDetails) -> Vec<u8> {
    let mut out = Vec::with_capacity(96 + details.resources.len() * 29);

    out.extend_from_slice(QUOTE_DOMAIN_TAG);
    out.extend_from_slice(&details.workload_id.to_be_bytes());
    out.extend_from_slice(&details.ttl_blocks.to_be_bytes());
    encode_decimal(&mut out, &details.total_cost_rate);
    out.extend_from_slice(&details.timestamp.to_be_bytes());
    out.extend_from_slice(&details.expiry.to_be_bytes());

    out.extend_from_slice(&(details.resources.len() as u32).to_be_bytes());
    for resource in &details.resources {
        out.push(resource.kind.tag());
        out.extend_from_slice(&resource.count.to_be_bytes());
        encode_decimal(&mut out, &resource.price_per_unit_rate);
    }

    encode_asset(&mut out, &details.security_commitment.asset);
    out.push(details.security_commitment.exposure_percent);

    out
}

/// BLAKE3 hash of the canonical encoding
pub fn quote_hash(details: &QuoteDetails) -> [u8; HASH_SIZE] {
    *blake3::hash(&encode_quote(details)).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::resource::{ResourceKind, ResourcePricing};
    use crate::types::security::AssetSecurityCommitment;
    use rust_decimal_macros::dec;

    fn details() -> QuoteDetails {
        QuoteDetails {
            workload_id: 1,
            ttl_blocks: 100,
            total_cost_rate: dec!(31.92),
            timestamp: 1_700_000_000,
            expiry: 1_700_000_300,
            resources: vec![
                ResourcePricing::new(ResourceKind::Cpu, 2, dec!(0.001)),
                ResourcePricing::new(ResourceKind::MemoryMb, 1024, dec!(0.00005)),
            ],
            security_commitment: AssetSecurityCommitment {
                asset: Asset::Custom(1),
                exposure_percent: 20,
            },
        }
    }

    #[test]
    fn test_encoding_layout() {
        let bytes = encode_quote(&details());
        assert_eq!(&bytes[..16], QUOTE_DOMAIN_TAG);
        assert_eq!(&bytes[16..24], &1u64.to_be_bytes());
        assert_eq!(&bytes[24..32], &100u64.to_be_bytes());

        // 16 tag + 2*8 ids + 20 decimal + 2*8 times + 4 count
        // + 2 * (1 + 8 + 20) resources + 1 + 8 asset + 1 exposure
        assert_eq!(bytes.len(), 16 + 16 + 20 + 16 + 4 + 2 * 29 + 9 + 1);
    }

    #[test]
    fn test_decimal_scale_independent() {
        let mut a = details();
        let mut b = details();
        a.total_cost_rate = dec!(31.92);
        b.total_cost_rate = dec!(31.9200);
        assert_eq!(quote_hash(&a), quote_hash(&b));
    }

    #[test]
    fn test_hash_sensitive_to_fields() {
        let base = quote_hash(&details());

        let mut changed = details();
        changed.expiry += 1;
        assert_ne!(quote_hash(&changed), base);

        let mut changed = details();
        changed.security_commitment.asset = Asset::Erc20([0u8; 20]);
        assert_ne!(quote_hash(&changed), base);

        let mut changed = details();
        changed.resources.swap(0, 1);
        assert_ne!(quote_hash(&changed), base);
    }
}
