//! Configuration for repair runs
//!
//! Defaults, then `crepair.yaml` (or `--config`), then `CREPAIR_*`
//! environment variables. Validation runs after every merge.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
