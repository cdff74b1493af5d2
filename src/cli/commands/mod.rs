//! CLI command implementations.

pub mod blend;
pub mod rank;
pub mod repair;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::tables::{read_partition, read_samples, read_verdicts};
use crate::adapters::ProcessPlant;
use crate::domain::models::{Benchmark, Config, Region, RegionId, SampledState, Verdict};
use crate::domain::ports::RobustnessOracle;
use crate::infrastructure::config::ConfigLoader;

/// Apply a `--benchmark` override to the loaded configuration.
pub(crate) fn apply_benchmark(config: &mut Config, benchmark: Option<&str>) -> Result<()> {
    if let Some(name) = benchmark {
        config.benchmark = ConfigLoader::parse_benchmark(name)?;
    }
    Ok(())
}

/// Read a sampling table for the configured benchmark.
pub(crate) async fn load_samples(path: &Path, benchmark: Benchmark) -> Result<Vec<SampledState>> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_samples(&owned, benchmark))
        .await?
        .with_context(|| format!("Failed to read samples from {}", path.display()))
}

/// Read a verifier output table.
pub(crate) async fn load_verdicts(path: &Path) -> Result<BTreeMap<RegionId, Verdict>> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_verdicts(&owned))
        .await?
        .with_context(|| format!("Failed to read verdicts from {}", path.display()))
}

/// Read a region partition table.
pub(crate) async fn load_partition(path: &Path, benchmark: Benchmark) -> Result<Vec<Region>> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_partition(&owned, benchmark))
        .await?
        .with_context(|| format!("Failed to read partition {}", path.display()))
}

/// Start the configured plant simulator.
pub(crate) fn plant_oracle(config: &Config) -> Result<Arc<dyn RobustnessOracle>> {
    let plant = ProcessPlant::spawn(&config.plant).context("Failed to start plant simulator")?;
    Ok(Arc::new(plant))
}
