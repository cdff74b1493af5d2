//! Simulated annealing over controller parameters for one region's bad states.
//!
//! Each iteration perturbs every parameter with i.i.d. Gaussian noise inside a
//! [`ParameterTransaction`](crate::domain::models::ParameterTransaction),
//! rescores the batch, and either commits or lets the transaction roll back
//! according to the Metropolis-Hastings rule. The temperature cools
//! geometrically every iteration regardless of the decision.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{AnnealingConfig, ControllerCheckpoint, RegionId, StateVector};
use crate::domain::ports::EnergyFunction;

/// Decision taken for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    /// Energy delta under the acceptance threshold
    Improved,
    /// Worse proposal kept by the Metropolis-Hastings draw
    AcceptedUphill,
    /// Proposal rolled back
    Rejected,
}

impl StepDecision {
    /// Whether the proposal was kept.
    pub const fn kept(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Result of a full annealing run.
#[derive(Debug, Clone)]
pub struct AnnealingOutcome {
    /// Last state of the chain (not the best one seen)
    pub controller: ControllerCheckpoint,
    pub initial_energy: f64,
    pub final_energy: f64,
    /// Lowest energy seen, for reporting only
    pub best_energy: f64,
    pub accepted: usize,
    pub rejected: usize,
    pub final_temperature: f64,
}

/// Simulated annealing search.
#[derive(Debug, Clone)]
pub struct Annealer {
    config: AnnealingConfig,
    noise: Normal<f64>,
}

impl Annealer {
    /// Create an annealer, validating the noise parameters.
    pub fn new(config: AnnealingConfig) -> RepairResult<Self> {
        if !(config.alpha > 0.0 && config.alpha < 1.0) {
            return Err(RepairError::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}",
                config.alpha
            )));
        }
        if config.initial_temperature <= 0.0 {
            return Err(RepairError::InvalidConfig(format!(
                "initial temperature must be positive, got {}",
                config.initial_temperature
            )));
        }
        if !(config.std >= 0.0 && config.std.is_finite()) {
            return Err(RepairError::InvalidConfig(format!(
                "perturbation std must be finite and non-negative, got {}",
                config.std
            )));
        }
        let noise = Normal::new(0.0, config.std).map_err(|e| {
            RepairError::InvalidConfig(format!("perturbation std {}: {e}", config.std))
        })?;
        Ok(Self { config, noise })
    }

    /// Annealing configuration in use.
    pub const fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    /// RNG for a given stream, seeded from the configured base seed when present.
    pub fn rng_for(&self, stream: u64) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_os_rng(),
        }
    }

    /// Run the full annealing schedule on a copy of `controller`.
    #[instrument(skip_all, fields(region = %region, batch = bad_states.len(), energy = energy.name()))]
    pub fn anneal<R: Rng + ?Sized>(
        &self,
        region: RegionId,
        controller: &ControllerCheckpoint,
        bad_states: &[StateVector],
        energy: &dyn EnergyFunction,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> RepairResult<AnnealingOutcome> {
        if bad_states.is_empty() {
            return Err(RepairError::EmptyBatch(region));
        }

        let mut current = controller.clone();
        let initial_energy = energy.score(bad_states, &current)?;
        let mut current_energy = initial_energy;
        let mut best_energy = initial_energy;
        let mut temperature = self.config.initial_temperature;
        let mut accepted = 0;
        let mut rejected = 0;

        for i in 0..self.config.num_iter {
            if cancel.is_cancelled() {
                return Err(RepairError::Cancelled);
            }

            let (decision, energy_after) =
                self.step(&mut current, current_energy, temperature, bad_states, energy, rng)?;
            trace!(iteration = i, ?decision, energy = energy_after, temperature, "annealing step");

            if decision.kept() {
                accepted += 1;
                current_energy = energy_after;
                best_energy = best_energy.min(current_energy);
            } else {
                rejected += 1;
            }

            temperature *= self.config.alpha;
        }

        debug!(
            initial_energy,
            final_energy = current_energy,
            best_energy,
            accepted,
            rejected,
            "annealing finished"
        );

        Ok(AnnealingOutcome {
            controller: current,
            initial_energy,
            final_energy: current_energy,
            best_energy,
            accepted,
            rejected,
            final_temperature: temperature,
        })
    }

    /// One proposal: perturb, rescore, then commit or roll back.
    ///
    /// Returns the decision and the energy of `current` afterwards. A
    /// rejected step leaves `current` bit-identical to its prior value.
    pub fn step<R: Rng + ?Sized>(
        &self,
        current: &mut ControllerCheckpoint,
        current_energy: f64,
        temperature: f64,
        bad_states: &[StateVector],
        energy: &dyn EnergyFunction,
        rng: &mut R,
    ) -> RepairResult<(StepDecision, f64)> {
        let mut tx = current.begin();
        for param in tx.params_mut() {
            *param += self.noise.sample(rng);
        }

        let proposed = energy.score(bad_states, tx.controller())?;
        let delta = proposed - current_energy;

        let decision = if delta < self.config.acceptance_threshold {
            StepDecision::Improved
        } else if rng.random::<f64>() < (-delta / temperature).exp() {
            StepDecision::AcceptedUphill
        } else {
            StepDecision::Rejected
        };

        if decision.kept() {
            tx.commit();
            Ok((decision, proposed))
        } else {
            drop(tx);
            Ok((decision, current_energy))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Energy is the squared distance of the first parameter from a target.
    struct Quadratic {
        target: f64,
        scale: f64,
    }

    impl EnergyFunction for Quadratic {
        fn name(&self) -> &'static str {
            "quadratic"
        }

        fn score(&self, _states: &[StateVector], controller: &ControllerCheckpoint) -> RepairResult<f64> {
            Ok(self.scale * (controller.params[0] - self.target).powi(2))
        }
    }

    fn config(num_iter: usize, seed: u64) -> AnnealingConfig {
        AnnealingConfig {
            std: 0.1,
            initial_temperature: 0.1,
            alpha: 0.95,
            num_iter,
            acceptance_threshold: 0.001,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_rejects_invalid_alpha() {
        let mut cfg = config(10, 0);
        cfg.alpha = 1.0;
        assert!(matches!(Annealer::new(cfg), Err(RepairError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_negative_std() {
        let mut cfg = config(10, 0);
        cfg.std = -1.0;
        assert!(matches!(Annealer::new(cfg), Err(RepairError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_finite_std() {
        for std in [f64::NAN, f64::INFINITY] {
            let mut cfg = config(10, 0);
            cfg.std = std;
            assert!(matches!(Annealer::new(cfg), Err(RepairError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_empty_batch_is_an_error() {
        let annealer = Annealer::new(config(10, 1)).unwrap();
        let energy = Quadratic { target: 1.0, scale: 1.0 };
        let mut rng = annealer.rng_for(0);
        let result = annealer.anneal(
            RegionId(3),
            &ControllerCheckpoint::from_params(vec![0.0]),
            &[],
            &energy,
            &mut rng,
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(RepairError::EmptyBatch(RegionId(3)))));
    }

    #[test]
    fn test_rejected_step_is_bit_identical() {
        let annealer = Annealer::new(config(1, 7)).unwrap();
        // Any perturbation raises the energy enormously
        let energy = Quadratic { target: 0.0, scale: 1.0e9 };
        let mut current = ControllerCheckpoint::from_params(vec![0.0, 0.125, -3.5]);
        let snapshot: Vec<u64> = current.params.iter().map(|p| p.to_bits()).collect();
        let mut rng = annealer.rng_for(0);

        let (decision, e) = annealer
            .step(&mut current, 0.0, 0.1, &[vec![0.0]], &energy, &mut rng)
            .unwrap();

        assert_eq!(decision, StepDecision::Rejected);
        assert_eq!(e, 0.0);
        let after: Vec<u64> = current.params.iter().map(|p| p.to_bits()).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_runs_exactly_num_iter() {
        let annealer = Annealer::new(config(37, 3)).unwrap();
        let energy = Quadratic { target: 1.0, scale: 1.0 };
        let mut rng = annealer.rng_for(0);
        let outcome = annealer
            .anneal(
                RegionId(0),
                &ControllerCheckpoint::from_params(vec![0.0]),
                &[vec![0.0]],
                &energy,
                &mut rng,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(outcome.accepted + outcome.rejected, 37);
        let expected_temperature = 0.1 * 0.95_f64.powi(37);
        assert!((outcome.final_temperature - expected_temperature).abs() < 1e-15);
        assert!(outcome.best_energy <= outcome.final_energy);
    }

    #[test]
    fn test_does_not_mutate_input() {
        let annealer = Annealer::new(config(20, 11)).unwrap();
        let energy = Quadratic { target: 5.0, scale: 1.0 };
        let original = ControllerCheckpoint::from_params(vec![0.0, 1.0]);
        let mut rng = annealer.rng_for(0);
        let outcome = annealer
            .anneal(
                RegionId(0),
                &original,
                &[vec![0.0]],
                &energy,
                &mut rng,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(original.params, vec![0.0, 1.0]);
        assert_ne!(outcome.controller.params, original.params);
    }

    #[test]
    fn test_same_seed_same_chain() {
        let annealer = Annealer::new(config(50, 42)).unwrap();
        let energy = Quadratic { target: 2.0, scale: 1.0 };
        let start = ControllerCheckpoint::from_params(vec![0.0, 0.0, 0.0]);
        let run = || {
            let mut rng = annealer.rng_for(9);
            annealer
                .anneal(RegionId(0), &start, &[vec![0.0]], &energy, &mut rng, &CancellationToken::new())
                .unwrap()
                .controller
                .params
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_final_energy_decreases_on_average() {
        let energy = Quadratic { target: 3.0, scale: 1.0 };
        let start = ControllerCheckpoint::from_params(vec![0.0]);
        let initial = 9.0;
        let mut total_final = 0.0;
        let runs = 40;
        for seed in 0..runs {
            let annealer = Annealer::new(config(200, seed)).unwrap();
            let mut rng = annealer.rng_for(0);
            let outcome = annealer
                .anneal(RegionId(0), &start, &[vec![0.0]], &energy, &mut rng, &CancellationToken::new())
                .unwrap();
            assert!((outcome.initial_energy - initial).abs() < 1e-12);
            total_final += outcome.final_energy;
        }
        assert!(total_final / (runs as f64) < initial);
    }

    #[test]
    fn test_cancellation_aborts() {
        let annealer = Annealer::new(config(1000, 5)).unwrap();
        let energy = Quadratic { target: 1.0, scale: 1.0 };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rng = annealer.rng_for(0);
        let result = annealer.anneal(
            RegionId(0),
            &ControllerCheckpoint::from_params(vec![0.0]),
            &[vec![0.0]],
            &energy,
            &mut rng,
            &cancel,
        );
        assert!(matches!(result, Err(RepairError::Cancelled)));
    }
}
