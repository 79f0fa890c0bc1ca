//! BenchmarkProfile - measured operator capability for one workload
//!
//! Profiles are produced by the external benchmarking harness and handed to
//! the engine's benchmark cache. A new benchmark supersedes the old profile;
//! profiles are never merged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PricingError;
use crate::types::resource::{ResourceKind, ResourceRequirement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkProfile {
    /// Workload (blueprint) this profile was measured for
    pub workload_id: u64,
    /// Measured capacity per resource kind
    pub capabilities: BTreeMap<ResourceKind, u64>,
    /// Measurement time (unix seconds)
    pub measured_at: u64,
}

impl BenchmarkProfile {
    pub fn new(workload_id: u64, measured_at: u64) -> Self {
        Self {
            workload_id,
            capabilities: BTreeMap::new(),
            measured_at,
        }
    }

    /// Record a measured capacity
    pub fn with_capability(mut self, kind: ResourceKind, capacity: u64) -> Self {
        self.capabilities.insert(kind, capacity);
        self
    }

    /// Measured capacity for a kind, if the benchmark covered it
    pub fn capacity_for(&self, kind: ResourceKind) -> Option<u64> {
        self.capabilities.get(&kind).copied()
    }

    /// Check every requirement fits the measured capacity.
    ///
    /// Kinds the benchmark did not measure are treated as unconstrained.
    pub fn check_capacity(&self, requirements: &[ResourceRequirement]) -> Result<(), PricingError> {
        for requirement in requirements {
            if let Some(capacity) = self.capacity_for(requirement.kind) {
                if requirement.count > capacity {
                    return Err(PricingError::CapacityExceeded {
                        kind: requirement.kind,
                        requested: requirement.count,
                        capacity,
                    });
                }
            }
        }
        Ok(())
    }
}
