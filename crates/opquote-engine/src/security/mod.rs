//! Security commitments

pub mod commitment;

pub use commitment::{CommitmentPolicy, SecurityCommitmentBuilder};
