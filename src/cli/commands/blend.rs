//! Blend command: search the segment between two controllers for one region.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{apply_benchmark, load_samples, load_verdicts, plant_oracle};
use crate::adapters::FileCheckpointStore;
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt};
use crate::domain::models::{bad_states_of, CheckpointTag, Config, RegionId};
use crate::domain::ports::CheckpointStore;
use crate::services::{color_regions, seed_good_states, BlendSearch, MonotonicityReport};

#[derive(Args, Debug)]
pub struct BlendArgs {
    /// Controller reproduced at weight 1 (usually the last accepted checkpoint)
    #[arg(long)]
    pub lo: PathBuf,

    /// Controller reproduced at weight 0 (usually the annealed candidate)
    #[arg(long)]
    pub hi: PathBuf,

    /// Sampling result CSV providing bad and good states
    #[arg(long)]
    pub samples: PathBuf,

    /// Region whose bad states must be repaired
    #[arg(long)]
    pub region: u32,

    /// Verifier output CSV used when choosing the protected states
    #[arg(long)]
    pub verifier_output: Option<PathBuf>,

    /// Benchmark selector (uuv, mc)
    #[arg(long)]
    pub benchmark: Option<String>,

    /// Also probe the blend line for monotonicity
    #[arg(long)]
    pub probe: bool,

    /// Persist the blended controller into this directory on success
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct BlendReportOutput {
    pub region: RegionId,
    pub bad_states: usize,
    pub good_states: usize,
    pub success: bool,
    pub weight: f64,
    pub effective_weight: f64,
    pub iterations: usize,
    pub max_iterations: usize,
    pub interval_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monotonicity: Option<MonotonicityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PathBuf>,
}

impl CommandOutput for BlendReportOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!(
                "Region {}: {} bad state(s), {} protected state(s)",
                self.region, self.bad_states, self.good_states
            ),
            if self.success {
                format!(
                    "Blend found at w = {:.6} (effective {:.6}) after {} of at most {} step(s)",
                    self.weight, self.effective_weight, self.iterations, self.max_iterations
                )
            } else {
                format!(
                    "No blend repairs this region (interval narrowed to {:.2e} after {} step(s))",
                    self.interval_width, self.iterations
                )
            },
        ];
        if let Some(report) = &self.monotonicity {
            lines.push(format!(
                "Monotonicity probe: {} ({} good flip(s), {} bad flip(s) over {} weights)",
                if report.is_monotonic() { "monotonic" } else { "NOT monotonic" },
                report.good_flips,
                report.bad_flips,
                report.probes.len()
            ));
        }
        if let Some(path) = &self.checkpoint {
            lines.push(format!("Checkpoint: {}", path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: BlendArgs, mut config: Config, json_mode: bool) -> Result<()> {
    apply_benchmark(&mut config, args.benchmark.as_deref())?;
    let region = RegionId(args.region);

    let samples = load_samples(&args.samples, config.benchmark).await?;
    let verdicts = match &args.verifier_output {
        Some(path) => load_verdicts(path).await?,
        None => BTreeMap::new(),
    };

    let bad_states = bad_states_of(&samples, region);
    let colors = color_regions(&verdicts, &samples);
    let good_states =
        seed_good_states(&colors, &samples, config.repair.good_states_per_region).states();

    let store = FileCheckpointStore::new(args.output_dir.clone().unwrap_or_default());
    let lo = store
        .load(&args.lo)
        .await
        .with_context(|| format!("Failed to load {}", args.lo.display()))?;
    let hi = store
        .load(&args.hi)
        .await
        .with_context(|| format!("Failed to load {}", args.hi.display()))?;

    let search = BlendSearch::new(config.blend.clone())?;
    let max_iterations = search.max_iterations();
    let oracle = plant_oracle(&config)?;

    let spinner = create_spinner(json_mode);
    spinner.set_message(format!("searching blend for region {region}"));

    let probe = args.probe;
    let (outcome, monotonicity) = {
        let (bad, good) = (bad_states.clone(), good_states.clone());
        let oracle = Arc::clone(&oracle);
        let cancel = CancellationToken::new();
        tokio::task::spawn_blocking(move || {
            let outcome = search.search(&lo, &hi, &bad, &good, oracle.as_ref(), &cancel)?;
            let monotonicity = if probe {
                Some(search.probe_monotonicity(&lo, &hi, &bad, &good, oracle.as_ref(), &cancel)?)
            } else {
                None
            };
            anyhow::Ok((outcome, monotonicity))
        })
        .await??
    };

    if outcome.success {
        spinner.finish_success(format!("blend found at w = {:.6}", outcome.weight));
    } else {
        spinner.finish_warning("no repairing blend found");
    }

    let checkpoint = match (&args.output_dir, outcome.success) {
        (Some(dir), true) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let tag = CheckpointTag {
                iteration: 0,
                region,
            };
            Some(store.persist(&outcome.controller, tag).await?)
        }
        _ => None,
    };

    output(
        &BlendReportOutput {
            region,
            bad_states: bad_states.len(),
            good_states: good_states.len(),
            success: outcome.success,
            weight: outcome.weight,
            effective_weight: outcome.effective_weight,
            iterations: outcome.iterations,
            max_iterations,
            interval_width: outcome.interval_width,
            monotonicity,
            checkpoint,
        },
        json_mode,
    );
    Ok(())
}
