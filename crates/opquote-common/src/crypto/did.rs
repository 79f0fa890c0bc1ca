//! Operator DID rendering
//!
//! Operators are identified on the wire by their raw 32-byte Ed25519 public
//! key. For logs and the REST surface the same key is rendered as a
//! W3C `did:key` (Ed25519 multicodec + base58btc multibase).

use ed25519_dalek::VerifyingKey;

use crate::error::CryptoError;

/// Ed25519 multicodec prefix for did:key
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Encode an Ed25519 public key as a did:key
pub fn encode_did_key(public_key: &[u8; 32]) -> String {
    let mut prefixed = Vec::with_capacity(34);
    prefixed.extend_from_slice(&ED25519_MULTICODEC);
    prefixed.extend_from_slice(public_key);

    let encoded = bs58::encode(&prefixed).into_string();
    format!("did:key:z{}", encoded)
}

/// Decode a did:key back to the Ed25519 public key
pub fn decode_did_key(did: &str) -> Result<[u8; 32], CryptoError> {
    let encoded = did
        .strip_prefix("did:key:z")
        .ok_or(CryptoError::InvalidPublicKey)?;

    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| CryptoError::InvalidPublicKey)?;

    if decoded.len() != 34 || decoded[..2] != ED25519_MULTICODEC {
        return Err(CryptoError::InvalidPublicKey);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded[2..]);
    Ok(key)
}

/// Resolve an operator id (raw key bytes) to a verifying key
pub fn verifying_key_from_operator_id(operator_id: &[u8; 32]) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_bytes(operator_id).map_err(|_| CryptoError::InvalidPublicKey)
}
