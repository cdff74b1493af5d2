//! Rank command: color regions and show the repair queue without repairing.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{apply_benchmark, load_partition, load_samples, load_verdicts};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, RegionColor, RegionPriority};
use crate::services::{color_regions, red_queue, regions_with_color, summarize_regions, RegionSummary};

#[derive(Args, Debug)]
pub struct RankArgs {
    /// Verifier output CSV (`region,verdict`)
    #[arg(long)]
    pub verifier_output: PathBuf,

    /// Sampling result CSV (`region,<state columns>,result`)
    #[arg(long)]
    pub samples: PathBuf,

    /// Optional partition CSV to show region bounds
    #[arg(long)]
    pub regions: Option<PathBuf>,

    /// Benchmark selector (uuv, mc)
    #[arg(long)]
    pub benchmark: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RankOutput {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
    pub regions: Vec<RegionSummary>,
    pub queue: Vec<RegionPriority>,
}

impl CommandOutput for RankOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut lines = vec![
            format!(
                "Regions: {} red, {} yellow, {} green",
                self.red, self.yellow, self.green
            ),
            formatter.format_regions(&self.regions),
        ];
        if self.queue.is_empty() {
            lines.push("Repair queue is empty.".to_string());
        } else {
            lines.push("Repair queue (most negative first):".to_string());
            for (i, entry) in self.queue.iter().enumerate() {
                lines.push(format!(
                    "  {:>3}. region {:<6} avg robustness {:.4}",
                    i + 1,
                    entry.region,
                    entry.avg_robustness
                ));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RankArgs, mut config: Config, json_mode: bool) -> Result<()> {
    apply_benchmark(&mut config, args.benchmark.as_deref())?;

    let samples = load_samples(&args.samples, config.benchmark).await?;
    let verdicts = load_verdicts(&args.verifier_output).await?;
    let partition = match &args.regions {
        Some(path) => load_partition(path, config.benchmark).await?,
        None => Vec::new(),
    };

    let colors = color_regions(&verdicts, &samples);
    let result = RankOutput {
        red: regions_with_color(&colors, RegionColor::Red).len(),
        yellow: regions_with_color(&colors, RegionColor::Yellow).len(),
        green: regions_with_color(&colors, RegionColor::Green).len(),
        regions: summarize_regions(&colors, &samples, &partition),
        queue: red_queue(&colors, &samples),
    };

    output(&result, json_mode);
    Ok(())
}
