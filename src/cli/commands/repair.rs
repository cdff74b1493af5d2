//! Repair command: run the full incremental repair loop.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{apply_benchmark, load_samples, plant_oracle};
use crate::adapters::{CsvVerifier, FileCheckpointStore, ResimulatingSampler};
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::{Config, RepairReport};
use crate::domain::ports::{CheckpointStore, RobustnessEnergy};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{RepairCollaborators, RepairEvent, RepairOrchestrator};

/// File name of the run report inside the output directory.
pub const REPORT_FILE: &str = "repair_report.json";

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Verifier output CSV (`region,verdict`)
    #[arg(long)]
    pub verifier_output: PathBuf,

    /// Sampling result CSV for the initial controller
    #[arg(long)]
    pub samples: PathBuf,

    /// Initial controller checkpoint (YAML or JSON)
    #[arg(long)]
    pub network: PathBuf,

    /// Directory receiving checkpoints, sample checkpoints, and the report
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Benchmark selector (uuv, mc)
    #[arg(long)]
    pub benchmark: Option<String>,

    /// Base seed for annealing, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop the run after this many seconds and report what was done
    #[arg(long)]
    pub time_limit_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RepairOutput {
    pub report_path: PathBuf,
    #[serde(flatten)]
    pub report: RepairReport,
}

impl CommandOutput for RepairOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let report = &self.report;
        let mut lines = vec![format!(
            "Repair run {} {} after {} iteration(s)",
            report.run_id,
            if report.interrupted { "interrupted" } else { "finished" },
            report.iterations.len()
        )];
        lines.push(format!("Initial red regions: {}", report.initial_red_regions));
        if !report.iterations.is_empty() {
            lines.push(formatter.format_iterations(&report.iterations));
        }
        lines.push(formatter.format_counters(&report.counters));
        lines.push(format!("Good states protected: {}", report.final_good_states));
        lines.push(format!("Checkpoints written: {}", report.checkpoints.len()));
        for path in &report.checkpoints {
            lines.push(format!("  {}", path.display()));
        }
        lines.push(format!("Report: {}", self.report_path.display()));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RepairArgs, mut config: Config, json_mode: bool) -> Result<()> {
    apply_benchmark(&mut config, args.benchmark.as_deref())?;
    if args.seed.is_some() {
        config.annealing.seed = args.seed;
    }
    if args.time_limit_secs.is_some() {
        config.repair.time_limit_secs = args.time_limit_secs;
    }
    ConfigLoader::validate(&config)?;

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    let samples = load_samples(&args.samples, config.benchmark).await?;
    let store = Arc::new(FileCheckpointStore::new(&args.output_dir));
    let initial = store
        .load(&args.network)
        .await
        .with_context(|| format!("Failed to load controller {}", args.network.display()))?;
    info!(
        benchmark = %config.benchmark,
        samples = samples.len(),
        params = initial.len(),
        "inputs loaded"
    );

    let oracle = plant_oracle(&config)?;
    let collaborators = RepairCollaborators {
        verifier: Arc::new(CsvVerifier::new(&args.verifier_output)),
        sampler: Arc::new(
            ResimulatingSampler::from_samples(&samples, Arc::clone(&oracle), config.benchmark)
                .with_output_dir(&args.output_dir),
        ),
        energy: Arc::new(RobustnessEnergy::new(Arc::clone(&oracle), config.repair.energy)),
        oracle,
        store,
    };

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), config.repair.time_limit_secs);

    let (event_tx, event_rx) = mpsc::channel(64);
    let progress = tokio::spawn(show_progress(event_rx, json_mode));

    let orchestrator = RepairOrchestrator::new(&config, collaborators)?
        .with_events(event_tx)
        .with_cancellation(cancel.clone());
    let result = orchestrator.run(initial, samples).await;
    drop(orchestrator);
    cancel.cancel();
    let _ = progress.await;

    let report = result.context("Repair run failed")?;
    let report_path = write_report(&args.output_dir, &report).await?;

    output(
        &RepairOutput {
            report_path,
            report,
        },
        json_mode,
    );
    Ok(())
}

/// Cancel the run on Ctrl-C or once the time limit elapses.
fn spawn_cancellation(cancel: CancellationToken, time_limit_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    warn!("interrupt received, finishing current step");
                    on_signal.cancel();
                }
            }
            () = on_signal.cancelled() => {}
        }
    });

    if let Some(secs) = time_limit_secs {
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {
                    warn!(secs, "time limit reached, stopping repair");
                    cancel.cancel();
                }
                () = cancel.cancelled() => {}
            }
        });
    }
}

async fn show_progress(mut events: mpsc::Receiver<RepairEvent>, json_mode: bool) {
    let spinner = create_spinner(json_mode);

    while let Some(event) = events.recv().await {
        match event {
            RepairEvent::Started { red_regions, .. } => {
                spinner.set_message(format!("{red_regions} red region(s) to repair"));
            }
            RepairEvent::IterationStarted {
                iteration,
                region,
                bad_states,
            } => spinner.set_message(format!(
                "iter {iteration}: annealing region {region} ({bad_states} bad states)"
            )),
            RepairEvent::AnnealingFinished {
                iteration,
                final_energy,
                ..
            } => spinner.set_message(format!("iter {iteration}: energy {final_energy:.4}, checking")),
            RepairEvent::BlendFinished { iteration, weight, .. } => {
                spinner.set_message(format!("iter {iteration}: blended at w = {weight:.6}"));
            }
            RepairEvent::Classified { region, case, .. } => {
                spinner.println(format!("region {region}: {case}"));
            }
            RepairEvent::Skipped { region, reason, .. } => {
                spinner.println(format!("region {region}: skipped ({reason:?})"));
            }
            RepairEvent::NonMonotonicBlend { iteration, .. } => {
                spinner.println(format!("iter {iteration}: blend line is not monotonic"));
            }
            RepairEvent::CheckpointPersisted { path } => {
                spinner.println(format!("checkpoint {}", path.display()));
            }
            RepairEvent::Finished {
                counters,
                interrupted,
            } => {
                let summary = format!("{} attempt(s) classified", counters.total());
                if interrupted {
                    spinner.finish_warning(format!("interrupted, {summary}"));
                } else {
                    spinner.finish_success(summary);
                }
            }
        }
    }
    if !spinner.is_finished() {
        spinner.finish_and_clear();
    }
}

async fn write_report(output_dir: &Path, report: &RepairReport) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
