//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::blend::BlendArgs;
use super::commands::rank::RankArgs;
use super::commands::repair::RepairArgs;

#[derive(Parser)]
#[command(name = "crepair")]
#[command(
    about = "Incremental repair of neural network controllers against verifier counterexamples",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to crepair.yaml in the working directory)
    #[arg(short, long, global = true, env = "CREPAIR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repair a controller region by region until no red region is left
    Repair(RepairArgs),

    /// Color regions and print the repair queue
    Rank(RankArgs),

    /// Run a single blend search between two controllers
    Blend(BlendArgs),
}
