//! Quote signing and verification
//!
//! The operator signs the 32-byte BLAKE3 hash of the canonical quote encoding
//! with its Ed25519 key. Verification recomputes the hash from the embedded
//! quote body, so any field changed after signing breaks the signature.

use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing::debug;

use crate::crypto::canonical::quote_hash;
use crate::crypto::did::{encode_did_key, verifying_key_from_operator_id};
use crate::error::CryptoError;
use crate::types::quote::{QuoteDetails, SignedQuote};

/// Operator quote signer
///
/// The key is read-only after load and shared across concurrent signings.
#[derive(Clone)]
pub struct QuoteSigner {
    signing_key: Arc<SigningKey>,
}

impl std::fmt::Debug for QuoteSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSigner")
            .field("operator", &self.operator_did())
            .finish()
    }
}

impl QuoteSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key: Arc::new(signing_key),
        }
    }

    /// Generate a fresh random operator key
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Load the operator key from a hex-encoded 32-byte secret
    pub fn from_secret_hex(secret: &str) -> Result<Self, CryptoError> {
        let raw = secret.trim();
        let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let secret: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::new(SigningKey::from_bytes(&secret)))
    }

    /// Operator identity embedded in responses (raw Ed25519 public key)
    pub fn operator_id(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Operator identity rendered as a did:key
    pub fn operator_did(&self) -> String {
        encode_did_key(&self.operator_id())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hash and sign a quote body
    pub fn sign(
        &self,
        details: QuoteDetails,
        proof_of_work_response: Vec<u8>,
    ) -> Result<SignedQuote, CryptoError> {
        if details.expiry <= details.timestamp {
            return Err(CryptoError::SigningFailure(format!(
                "quote expiry {} is not after timestamp {}",
                details.expiry, details.timestamp
            )));
        }

        let hash = quote_hash(&details);
        let signature = self
            .signing_key
            .try_sign(&hash)
            .map_err(|e| CryptoError::SigningFailure(e.to_string()))?;

        debug!(
            workload_id = details.workload_id,
            quote_hash = %hex::encode(hash),
            "Signed quote"
        );

        Ok(SignedQuote {
            quote_details: details,
            signature: signature.to_bytes(),
            operator_id: self.operator_id(),
            proof_of_work_response,
        })
    }
}

/// Verify a signed quote against an operator's public key
pub fn verify_signed_quote(signed: &SignedQuote, operator_key: &VerifyingKey) -> bool {
    if signed.operator_id != operator_key.to_bytes() {
        return false;
    }

    let hash = quote_hash(&signed.quote_details);
    let signature = Signature::from_bytes(&signed.signature);

    operator_key.verify_strict(&hash, &signature).is_ok()
}

impl SignedQuote {
    /// Verify against the operator id embedded in the quote itself.
    ///
    /// Proves integrity and possession of the key, not that the key belongs
    /// to an operator the caller trusts.
    pub fn verify_self_attested(&self) -> bool {
        match verifying_key_from_operator_id(&self.operator_id) {
            Ok(key) => verify_signed_quote(self, &key),
            Err(_) => false,
        }
    }
}
