//! Controller repair - incremental repair of neural network controllers
//!
//! Given a controller, per-region verifier verdicts, and sampled closed-loop
//! robustness, the repair loop picks the worst red region, anneals the
//! controller parameters until that region's counterexamples are fixed, and
//! falls back to a convex-combination blend with the last accepted controller
//! whenever the annealed candidate breaks previously good states.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): data model, errors, and the port traits
//!   implemented by the verifier, sampler, plant simulator, and checkpoint store
//! - **Service Layer** (`services`): region prioritization, annealing, blend
//!   search, and the repair orchestrator
//! - **Adapters** (`adapters`): CSV tables, file checkpoints, and the plant
//!   subprocess
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use controller_repair::{ConfigLoader, RepairCollaborators, RepairOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let orchestrator = RepairOrchestrator::new(&config, collaborators)?;
//!     let report = orchestrator.run(initial, samples).await?;
//!     println!("{:?}", report.counters);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RepairError, RepairResult};
pub use domain::models::{
    Benchmark, Config, ControllerCheckpoint, GoodStateSet, RegionColor, RegionId, RepairCase,
    RepairCaseCounters, RepairReport, SampledState, Verdict,
};
pub use domain::ports::{
    CheckpointStore, EnergyFunction, RobustnessEnergy, RobustnessOracle, Sampler, Verifier,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    Annealer, BlendSearch, RepairCollaborators, RepairEvent, RepairOrchestrator,
};
