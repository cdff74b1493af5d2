//! Sampled initial states and the batches built from them.

use serde::{Deserialize, Serialize};

use super::region::RegionId;

/// A point in the initial-state space.
pub type StateVector = Vec<f64>;

/// A state drawn from a region, scored under the controller that was active
/// when it was sampled. Robustness `>= 0` means the safety property holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledState {
    pub region: RegionId,
    pub state: StateVector,
    pub robustness: f64,
}

impl SampledState {
    /// Create a new sampled state.
    pub const fn new(region: RegionId, state: StateVector, robustness: f64) -> Self {
        Self {
            region,
            state,
            robustness,
        }
    }

    /// Whether this sample violates the safety property.
    pub fn is_bad(&self) -> bool {
        self.robustness < 0.0
    }
}

/// Bad states of the region currently under repair.
pub fn bad_states_of(samples: &[SampledState], region: RegionId) -> Vec<StateVector> {
    samples
        .iter()
        .filter(|s| s.region == region && s.is_bad())
        .map(|s| s.state.clone())
        .collect()
}
