//! Robustness oracle port - simulate a controller from an initial state and score the trajectory.

use rayon::prelude::*;

use crate::domain::errors::RepairResult;
use crate::domain::models::{ControllerCheckpoint, StateVector};

/// Closed-loop simulator plus robustness function.
///
/// Robustness `>= 0` means the trajectory satisfies the safety property and
/// `< 0` means it violates it. Implementations must be deterministic for a
/// fixed controller and state, and free of side effects visible to other
/// calls, because batches are evaluated in parallel.
pub trait RobustnessOracle: Send + Sync {
    /// Score one initial state under the given controller.
    fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64>;

    /// Score a batch of initial states.
    ///
    /// The default fans the batch out across the rayon pool and returns the
    /// results in input order once every state has been scored.
    fn robustness_batch(
        &self,
        controller: &ControllerCheckpoint,
        states: &[StateVector],
    ) -> RepairResult<Vec<f64>> {
        states
            .par_iter()
            .map(|state| self.robustness(controller, state))
            .collect()
    }
}
