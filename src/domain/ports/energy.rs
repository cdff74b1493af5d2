//! Energy port - the scalar objective minimized by simulated annealing.

use std::sync::Arc;

use crate::domain::errors::RepairResult;
use crate::domain::models::{ControllerCheckpoint, EnergyKind, StateVector};

use super::robustness::RobustnessOracle;

/// Scores a controller over a batch of states; lower is better.
///
/// Must be deterministic for a fixed controller and state batch.
pub trait EnergyFunction: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Energy of `controller` over `states`.
    fn score(&self, states: &[StateVector], controller: &ControllerCheckpoint) -> RepairResult<f64>;
}

/// Energy derived from the robustness of each state in the batch.
pub struct RobustnessEnergy {
    oracle: Arc<dyn RobustnessOracle>,
    kind: EnergyKind,
}

impl RobustnessEnergy {
    /// Create an energy function of the given kind over an oracle.
    pub fn new(oracle: Arc<dyn RobustnessOracle>, kind: EnergyKind) -> Self {
        Self { oracle, kind }
    }
}

impl EnergyFunction for RobustnessEnergy {
    fn name(&self) -> &'static str {
        match self.kind {
            EnergyKind::NegativeMeanRobustness => "negative_mean_robustness",
            EnergyKind::TotalViolation => "total_violation",
        }
    }

    fn score(&self, states: &[StateVector], controller: &ControllerCheckpoint) -> RepairResult<f64> {
        if states.is_empty() {
            return Ok(0.0);
        }
        let robustness = self.oracle.robustness_batch(controller, states)?;
        Ok(match self.kind {
            EnergyKind::NegativeMeanRobustness => {
                -robustness.iter().sum::<f64>() / robustness.len() as f64
            }
            EnergyKind::TotalViolation => robustness.iter().map(|r| (-r).max(0.0)).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Robustness is the first parameter minus the first state coordinate.
    struct Offset;

    impl RobustnessOracle for Offset {
        fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64> {
            Ok(controller.params[0] - state[0])
        }
    }

    #[test]
    fn test_negative_mean_robustness() {
        let energy = RobustnessEnergy::new(Arc::new(Offset), EnergyKind::NegativeMeanRobustness);
        let controller = ControllerCheckpoint::from_params(vec![1.0]);
        // robustness: 1-0=1, 1-4=-3 -> mean -1 -> energy 1
        let e = energy.score(&[vec![0.0], vec![4.0]], &controller).unwrap();
        assert!((e - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_violation_ignores_satisfied_states() {
        let energy = RobustnessEnergy::new(Arc::new(Offset), EnergyKind::TotalViolation);
        let controller = ControllerCheckpoint::from_params(vec![1.0]);
        let e = energy
            .score(&[vec![0.0], vec![4.0], vec![2.5]], &controller)
            .unwrap();
        assert!((e - 4.5).abs() < 1e-12);
        assert_eq!(energy.name(), "total_violation");
    }

    #[test]
    fn test_empty_batch_scores_zero() {
        let energy = RobustnessEnergy::new(Arc::new(Offset), EnergyKind::NegativeMeanRobustness);
        let controller = ControllerCheckpoint::from_params(vec![1.0]);
        assert_eq!(energy.score(&[], &controller).unwrap(), 0.0);
    }
}
