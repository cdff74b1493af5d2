//! Common test utilities for integration tests
//!
//! Provides in-memory collaborators for the repair loop and a one-parameter
//! synthetic plant whose robustness is easy to reason about.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use controller_repair::domain::errors::{RepairError, RepairResult};
use controller_repair::domain::models::{
    AnnealingConfig, CheckpointTag, Config, ControllerCheckpoint, RegionId, SampledState,
    StateVector, Verdict,
};
use controller_repair::domain::ports::{
    CheckpointStore, EnergyFunction, RobustnessOracle, Sampler, Verifier,
};
use controller_repair::services::RepairCollaborators;

/// Robustness is `state[0] * p + state[1]` for the single parameter `p`.
#[derive(Default)]
pub struct LinearPlant {
    calls: AtomicUsize,
}

impl LinearPlant {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RobustnessOracle for LinearPlant {
    fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(state[0] * controller.params[0] + state[1])
    }
}

/// Pulls the parameter toward a fixed target regardless of the batch.
pub struct TargetEnergy {
    pub target: f64,
}

impl EnergyFunction for TargetEnergy {
    fn name(&self) -> &'static str {
        "target"
    }

    fn score(&self, _states: &[StateVector], controller: &ControllerCheckpoint) -> RepairResult<f64> {
        Ok(100.0 * (controller.params[0] - self.target).powi(2))
    }
}

/// Verifier with fixed verdicts.
#[derive(Default)]
pub struct StaticVerifier {
    pub verdicts: BTreeMap<RegionId, Verdict>,
}

#[async_trait]
impl Verifier for StaticVerifier {
    async fn verdicts(
        &self,
        _controller: &ControllerCheckpoint,
    ) -> RepairResult<BTreeMap<RegionId, Verdict>> {
        Ok(self.verdicts.clone())
    }
}

/// Rescores a fixed set of states through an oracle.
pub struct RescoringSampler {
    pub states: Vec<(RegionId, StateVector)>,
    pub oracle: Arc<dyn RobustnessOracle>,
}

#[async_trait]
impl Sampler for RescoringSampler {
    async fn sample(
        &self,
        controller: &ControllerCheckpoint,
        _tag: CheckpointTag,
    ) -> RepairResult<Vec<SampledState>> {
        self.states
            .iter()
            .map(|(region, state)| {
                let r = self.oracle.robustness(controller, state)?;
                Ok(SampledState::new(*region, state.clone(), r))
            })
            .collect()
    }
}

/// Sampler that always reports the same samples, whatever the controller.
pub struct FrozenSampler {
    pub samples: Vec<SampledState>,
}

#[async_trait]
impl Sampler for FrozenSampler {
    async fn sample(
        &self,
        _controller: &ControllerCheckpoint,
        _tag: CheckpointTag,
    ) -> RepairResult<Vec<SampledState>> {
        Ok(self.samples.clone())
    }
}

/// Keeps persisted checkpoints in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<(CheckpointTag, ControllerCheckpoint)>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<(CheckpointTag, ControllerCheckpoint)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self, path: &Path) -> RepairResult<ControllerCheckpoint> {
        Err(RepairError::CheckpointError(format!(
            "{} is not in memory",
            path.display()
        )))
    }

    async fn persist(
        &self,
        controller: &ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<PathBuf> {
        self.saved.lock().unwrap().push((tag, controller.clone()));
        Ok(PathBuf::from(format!("memory/tanh_{tag}")))
    }
}

/// Config with a fast, nearly greedy annealing schedule.
pub fn test_config(seed: u64) -> Config {
    let mut config = Config::default();
    config.annealing = AnnealingConfig {
        std: 0.25,
        initial_temperature: 1e-4,
        alpha: 0.9,
        num_iter: 600,
        acceptance_threshold: 0.001,
        seed: Some(seed),
    };
    config.blend.epsilon = 1e-6;
    config
}

/// Region 0 holds the bad state `(1, -1)`, region 1 the good state `(-1, good_offset)`.
///
/// Under `p = 0` the bad state scores -1 and the good state scores `good_offset`.
pub fn two_region_samples(good_offset: f64) -> Vec<SampledState> {
    vec![
        SampledState::new(RegionId(0), vec![1.0, -1.0], -1.0),
        SampledState::new(RegionId(1), vec![-1.0, good_offset], good_offset),
    ]
}

pub struct Harness {
    pub plant: Arc<LinearPlant>,
    pub store: Arc<MemoryStore>,
    pub collaborators: RepairCollaborators,
}

/// Collaborators around [`LinearPlant`] that resample the given states.
pub fn harness(samples: &[SampledState], target: f64) -> Harness {
    let plant = Arc::new(LinearPlant::default());
    let store = Arc::new(MemoryStore::default());
    let oracle: Arc<dyn RobustnessOracle> = plant.clone();
    let collaborators = RepairCollaborators {
        verifier: Arc::new(StaticVerifier::default()),
        sampler: Arc::new(RescoringSampler {
            states: samples.iter().map(|s| (s.region, s.state.clone())).collect(),
            oracle: Arc::clone(&oracle),
        }),
        oracle,
        energy: Arc::new(TargetEnergy { target }),
        store: store.clone(),
    };
    Harness {
        plant,
        store,
        collaborators,
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
