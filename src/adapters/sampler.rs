//! Sampler adapter that re-scores a fixed set of initial states.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::tables::write_samples;
use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{
    Benchmark, CheckpointTag, ControllerCheckpoint, RegionId, SampledState, StateVector,
};
use crate::domain::ports::{RobustnessOracle, Sampler};

/// Re-simulates the initial sampling pass under each new controller.
///
/// The set of initial states never changes; only their robustness does.
/// When an output directory is set, each pass is written to
/// `sample_checkpoint_{tag}.csv`.
pub struct ResimulatingSampler {
    states: Vec<(RegionId, StateVector)>,
    oracle: Arc<dyn RobustnessOracle>,
    benchmark: Benchmark,
    output_dir: Option<PathBuf>,
}

impl ResimulatingSampler {
    /// Reuse the states of an existing sampling pass.
    pub fn from_samples(
        samples: &[SampledState],
        oracle: Arc<dyn RobustnessOracle>,
        benchmark: Benchmark,
    ) -> Self {
        Self {
            states: samples.iter().map(|s| (s.region, s.state.clone())).collect(),
            oracle,
            benchmark,
            output_dir: None,
        }
    }

    /// Write every pass into `dir`.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl Sampler for ResimulatingSampler {
    async fn sample(
        &self,
        controller: &ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<Vec<SampledState>> {
        let oracle = Arc::clone(&self.oracle);
        let controller = controller.clone();
        let states: Vec<StateVector> = self.states.iter().map(|(_, s)| s.clone()).collect();

        let robustness =
            tokio::task::spawn_blocking(move || oracle.robustness_batch(&controller, &states))
                .await?
                .map_err(|e| RepairError::SamplerFailed(e.to_string()))?;

        let samples: Vec<SampledState> = self
            .states
            .iter()
            .zip(robustness)
            .map(|((region, state), r)| SampledState::new(*region, state.clone(), r))
            .collect();
        let bad = samples.iter().filter(|s| s.is_bad()).count();
        debug!(%tag, samples = samples.len(), bad, "resampled");

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("sample_checkpoint_{tag}.csv"));
            let benchmark = self.benchmark;
            let written = samples.clone();
            let target = path.clone();
            tokio::task::spawn_blocking(move || write_samples(&target, benchmark, &written))
                .await??;
            info!(path = %path.display(), "sample checkpoint written");
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Shifted;

    impl RobustnessOracle for Shifted {
        fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64> {
            Ok(state[0] + controller.params[0])
        }
    }

    #[tokio::test]
    async fn test_rescores_under_new_controller() {
        let initial = vec![
            SampledState::new(RegionId(0), vec![-1.0, 0.0], -1.0),
            SampledState::new(RegionId(1), vec![2.0, 0.0], 2.0),
        ];
        let dir = TempDir::new().unwrap();
        let sampler = ResimulatingSampler::from_samples(&initial, Arc::new(Shifted), Benchmark::Uuv)
            .with_output_dir(dir.path());

        let tag = CheckpointTag {
            iteration: 3,
            region: RegionId(0),
        };
        let samples = sampler
            .sample(&ControllerCheckpoint::from_params(vec![1.5]), tag)
            .await
            .unwrap();

        assert_eq!(samples[0].robustness, 0.5);
        assert_eq!(samples[1].robustness, 3.5);
        assert!(samples.iter().all(|s| !s.is_bad()));

        let written = dir.path().join("sample_checkpoint_iter_3_region_0.csv");
        let reread = crate::adapters::tables::read_samples(&written, Benchmark::Uuv).unwrap();
        assert_eq!(reread, samples);
    }

    struct Broken;

    impl RobustnessOracle for Broken {
        fn robustness(&self, _controller: &ControllerCheckpoint, _state: &[f64]) -> RepairResult<f64> {
            Err(RepairError::SimulationFailed("plant exited".to_string()))
        }
    }

    #[tokio::test]
    async fn test_oracle_failure_is_sampler_failure() {
        let initial = vec![SampledState::new(RegionId(0), vec![0.0, 0.0], 1.0)];
        let sampler = ResimulatingSampler::from_samples(&initial, Arc::new(Broken), Benchmark::Uuv);
        let tag = CheckpointTag {
            iteration: 0,
            region: RegionId(0),
        };
        let result = sampler
            .sample(&ControllerCheckpoint::from_params(vec![0.0]), tag)
            .await;
        assert!(matches!(result, Err(RepairError::SamplerFailed(_))));
    }
}
