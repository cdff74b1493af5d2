//! Infrastructure layer module
//!
//! Ambient concerns shared by the CLI and the adapters:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
