//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces external collaborators implement:
//! - Verifier: per-region reachability verdicts
//! - Sampler: fresh per-state robustness after every controller update
//! - RobustnessOracle: closed-loop simulation plus robustness scoring
//! - EnergyFunction: the objective minimized by the annealer
//! - CheckpointStore: controller loading and persistence
//!
//! These traits keep the repair core independent of any particular plant,
//! verifier, or file format.

pub mod checkpoint_store;
pub mod energy;
pub mod robustness;
pub mod sampler;
pub mod verifier;

pub use checkpoint_store::CheckpointStore;
pub use energy::{EnergyFunction, RobustnessEnergy};
pub use robustness::RobustnessOracle;
pub use sampler::Sampler;
pub use verifier::Verifier;
