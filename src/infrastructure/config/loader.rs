use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::config::{Benchmark, Config};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown benchmark: {0}. Must be one of: uuv, mc")]
    UnknownBenchmark(String),

    #[error("Invalid alpha: {0}. Must be in (0, 1)")]
    InvalidAlpha(f64),

    #[error("Invalid perturbation std: {0}. Must be positive")]
    InvalidStd(f64),

    #[error("Invalid initial temperature: {0}. Must be positive")]
    InvalidTemperature(f64),

    #[error("Invalid num_iter: {0}. Must be at least 1")]
    InvalidNumIter(usize),

    #[error("Invalid blend epsilon: {0}. Must be in (0, 1)")]
    InvalidEpsilon(f64),

    #[error("Invalid monotonicity grid: {0}. Must be at least 2")]
    InvalidMonotonicityGrid(usize),

    #[error("Invalid max_passes_per_region: {0}. Cannot be 0")]
    InvalidMaxPasses(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. crepair.yaml in the working directory (optional)
    /// 3. Environment variables (CREPAIR_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Yaml::file("crepair.yaml"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Self::figment(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(file: figment::providers::Data<Yaml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .merge(Env::prefixed("CREPAIR_").split("__"))
    }

    /// Parse a benchmark selector given on the command line
    pub fn parse_benchmark(name: &str) -> Result<Benchmark, ConfigError> {
        Benchmark::from_str(name).map_err(ConfigError::UnknownBenchmark)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Annealing
        let annealing = &config.annealing;
        if !(annealing.alpha > 0.0 && annealing.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(annealing.alpha));
        }
        if !(annealing.std > 0.0 && annealing.std.is_finite()) {
            return Err(ConfigError::InvalidStd(annealing.std));
        }
        if annealing.initial_temperature.is_nan() || annealing.initial_temperature <= 0.0 {
            return Err(ConfigError::InvalidTemperature(annealing.initial_temperature));
        }
        if annealing.num_iter == 0 {
            return Err(ConfigError::InvalidNumIter(annealing.num_iter));
        }

        // Blend search
        if !(config.blend.epsilon > 0.0 && config.blend.epsilon < 1.0) {
            return Err(ConfigError::InvalidEpsilon(config.blend.epsilon));
        }
        if config.blend.monotonicity_grid < 2 {
            return Err(ConfigError::InvalidMonotonicityGrid(
                config.blend.monotonicity_grid,
            ));
        }

        if config.repair.max_passes_per_region == 0 {
            return Err(ConfigError::InvalidMaxPasses(
                config.repair.max_passes_per_region,
            ));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if !config.plant.args.is_empty() && config.plant.command.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "plant args given without a plant command".to_string(),
            ));
        }

        Ok(())
    }
}
