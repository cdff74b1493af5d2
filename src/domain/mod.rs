//! Domain layer for controller repair
//!
//! This module contains the core data model and the port traits that
//! external collaborators (verifier, sampler, plant simulator, checkpoint
//! storage) implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RepairError, RepairResult};
