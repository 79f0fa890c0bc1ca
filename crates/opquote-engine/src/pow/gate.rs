//! Proof-of-work admission gate
//!
//! Puzzle:
//! ```text
//! window_start     = now - now % window_secs
//! challenge_digest = BLAKE3("opquote/pow/v1" || workload_id BE || window_start BE || difficulty_bits)
//! proof            = window_start u64 BE || nonce u64 BE            (16 bytes)
//! work_hash        = BLAKE3(challenge_digest || nonce BE)
//! ```
//! A proof is valid when `work_hash` has at least `difficulty_bits` leading
//! zero bits and its window is the current or the immediately previous one.
//! Each work hash is accepted once; it stays in the consumed set until its
//! window can no longer be admitted.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use opquote_common::{ProofOfWorkError, DEFAULT_POW_DIFFICULTY_BITS, DEFAULT_POW_WINDOW_SECS};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Domain tag of the challenge digest
pub const POW_DOMAIN_TAG: &[u8] = b"opquote/pow/v1";

/// Encoded proof length
pub const PROOF_LEN: usize = 16;

/// Gate parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowSettings {
    /// Required leading zero bits of the work hash
    pub difficulty_bits: u8,
    /// Length of one challenge window
    pub window_secs: u64,
    /// Minimum time between sweeps of the consumed set
    pub sweep_interval_secs: u64,
}

impl Default for PowSettings {
    fn default() -> Self {
        Self {
            difficulty_bits: DEFAULT_POW_DIFFICULTY_BITS,
            window_secs: DEFAULT_POW_WINDOW_SECS,
            sweep_interval_secs: DEFAULT_POW_WINDOW_SECS,
        }
    }
}

/// Puzzle a client must solve for one workload in one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWorkChallenge {
    pub workload_id: u64,
    pub window_start: u64,
    pub difficulty_bits: u8,
    #[serde(with = "opquote_common::types::quote::hex_array")]
    pub digest: [u8; 32],
}

impl ProofOfWorkChallenge {
    /// Hash of this challenge with `nonce`
    pub fn work_hash(&self, nonce: u64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.digest);
        hasher.update(&nonce.to_be_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Whether `nonce` meets the difficulty target
    pub fn is_solved_by(&self, nonce: u64) -> bool {
        leading_zero_bits(&self.work_hash(nonce)) >= u32::from(self.difficulty_bits)
    }
}

/// Solved challenge as sent by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWorkProof {
    pub window_start: u64,
    pub nonce: u64,
}

impl ProofOfWorkProof {
    pub fn to_bytes(&self) -> [u8; PROOF_LEN] {
        let mut bytes = [0u8; PROOF_LEN];
        bytes[..8].copy_from_slice(&self.window_start.to_be_bytes());
        bytes[8..].copy_from_slice(&self.nonce.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofOfWorkError> {
        if bytes.is_empty() {
            return Err(ProofOfWorkError::Missing);
        }
        let bytes: &[u8; PROOF_LEN] = bytes.try_into().map_err(|_| {
            ProofOfWorkError::Malformed(format!(
                "expected {} bytes, got {}",
                PROOF_LEN,
                bytes.len()
            ))
        })?;

        let mut window_start = [0u8; 8];
        let mut nonce = [0u8; 8];
        window_start.copy_from_slice(&bytes[..8]);
        nonce.copy_from_slice(&bytes[8..]);
        Ok(Self {
            window_start: u64::from_be_bytes(window_start),
            nonce: u64::from_be_bytes(nonce),
        })
    }
}

/// Count leading zero bits of a hash
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut zeros = 0;
    for byte in hash {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros
}

/// Admission gate in front of the quote pipeline
pub struct ProofOfWorkGate {
    settings: PowSettings,
    /// Work hash → time after which the proof can no longer be admitted
    consumed: DashMap<[u8; 32], u64>,
    last_sweep: AtomicU64,
}

impl ProofOfWorkGate {
    pub fn new(settings: PowSettings) -> Self {
        Self {
            settings,
            consumed: DashMap::new(),
            last_sweep: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &PowSettings {
        &self.settings
    }

    /// Start of the window containing `now`
    pub fn window_start(&self, now: u64) -> u64 {
        now - now % self.settings.window_secs.max(1)
    }

    /// Challenge for `workload_id` in the window containing `now`
    pub fn challenge(&self, workload_id: u64, now: u64) -> ProofOfWorkChallenge {
        self.challenge_for_window(workload_id, self.window_start(now))
    }

    fn challenge_for_window(&self, workload_id: u64, window_start: u64) -> ProofOfWorkChallenge {
        let mut hasher = blake3::Hasher::new();
        hasher.update(POW_DOMAIN_TAG);
        hasher.update(&workload_id.to_be_bytes());
        hasher.update(&window_start.to_be_bytes());
        hasher.update(&[self.settings.difficulty_bits]);

        ProofOfWorkChallenge {
            workload_id,
            window_start,
            difficulty_bits: self.settings.difficulty_bits,
            digest: *hasher.finalize().as_bytes(),
        }
    }

    /// Check a proof against a challenge without consuming it.
    ///
    /// The challenge must be one this gate issued: its digest and difficulty
    /// are recomputed from the workload and window. Only [`admit`] marks a
    /// proof as used.
    ///
    /// [`admit`]: ProofOfWorkGate::admit
    pub fn verify(&self, challenge: &ProofOfWorkChallenge, proof: &ProofOfWorkProof) -> bool {
        *challenge == self.challenge_for_window(challenge.workload_id, challenge.window_start)
            && proof.window_start == challenge.window_start
            && challenge.is_solved_by(proof.nonce)
            && !self.consumed.contains_key(&challenge.work_hash(proof.nonce))
    }

    /// Parse, check and consume a proof for `workload_id`
    ///
    /// Returns the challenge the proof answered.
    #[instrument(skip(self, proof_bytes), fields(proof_len = proof_bytes.len()))]
    pub fn admit(
        &self,
        workload_id: u64,
        proof_bytes: &[u8],
        now: u64,
    ) -> Result<ProofOfWorkChallenge, ProofOfWorkError> {
        let proof = ProofOfWorkProof::from_bytes(proof_bytes)?;

        let current_window = self.window_start(now);
        let previous_window = current_window.saturating_sub(self.settings.window_secs);
        if proof.window_start != current_window && proof.window_start != previous_window {
            return Err(ProofOfWorkError::StaleWindow {
                window_start: proof.window_start,
                current_window,
            });
        }

        let challenge = self.challenge_for_window(workload_id, proof.window_start);
        let work_hash = challenge.work_hash(proof.nonce);
        let leading_zeros = leading_zero_bits(&work_hash);
        if leading_zeros < u32::from(self.settings.difficulty_bits) {
            return Err(ProofOfWorkError::InsufficientWork {
                leading_zeros,
                required: self.settings.difficulty_bits,
            });
        }

        self.sweep_if_due(now);

        // Entry API keeps check-and-insert atomic across concurrent requests
        match self.consumed.entry(work_hash) {
            Entry::Occupied(_) => Err(ProofOfWorkError::Replayed),
            Entry::Vacant(slot) => {
                slot.insert(self.evict_at(proof.window_start));
                debug!(
                    workload_id,
                    window_start = proof.window_start,
                    leading_zeros,
                    "Proof of work admitted"
                );
                Ok(challenge)
            }
        }
    }

    /// Reference solver
    pub fn solve(challenge: &ProofOfWorkChallenge) -> ProofOfWorkProof {
        let nonce = (0..=u64::MAX)
            .find(|nonce| challenge.is_solved_by(*nonce))
            .unwrap_or(u64::MAX);
        ProofOfWorkProof {
            window_start: challenge.window_start,
            nonce,
        }
    }

    /// Number of proofs currently held as consumed
    pub fn consumed_len(&self) -> usize {
        self.consumed.len()
    }

    /// Drop consumed proofs whose window can no longer be admitted
    pub fn sweep(&self, now: u64) -> usize {
        let before = self.consumed.len();
        self.consumed.retain(|_, evict_at| *evict_at > now);
        let removed = before.saturating_sub(self.consumed.len());
        if removed > 0 {
            debug!(removed, remaining = self.consumed.len(), "Swept consumed proofs");
        }
        removed
    }

    fn sweep_if_due(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now < last.saturating_add(self.settings.sweep_interval_secs) {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep(now);
        }
    }

    /// A window is admissible while it is current or previous
    fn evict_at(&self, window_start: u64) -> u64 {
        window_start.saturating_add(self.settings.window_secs.saturating_mul(2))
    }
}

impl Default for ProofOfWorkGate {
    fn default() -> Self {
        Self::new(PowSettings::default())
    }
}
