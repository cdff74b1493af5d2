//! Adapters binding the repair ports to files and external processes.
//!
//! - tables: CSV sampling, verifier, and partition tables
//! - verifier: verdicts from a fixed verifier output file
//! - sampler: re-simulation of the initial sampling pass
//! - checkpoint_store: JSON/YAML controller checkpoints
//! - plant: JSON-lines plant simulator process

pub mod checkpoint_store;
pub mod plant;
pub mod sampler;
pub mod tables;
pub mod verifier;

pub use checkpoint_store::FileCheckpointStore;
pub use plant::ProcessPlant;
pub use sampler::ResimulatingSampler;
pub use verifier::CsvVerifier;
