//! Proof-of-work admission

pub mod gate;

pub use gate::{
    leading_zero_bits, PowSettings, ProofOfWorkChallenge, ProofOfWorkGate, ProofOfWorkProof,
    PROOF_LEN,
};
