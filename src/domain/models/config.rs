use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Main configuration structure for a repair run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Benchmark selector: names the state features of samples and partitions
    #[serde(default)]
    pub benchmark: Benchmark,

    /// Simulated annealing configuration
    #[serde(default)]
    pub annealing: AnnealingConfig,

    /// Interpolated blend search configuration
    #[serde(default)]
    pub blend: BlendConfig,

    /// Outer repair loop configuration
    #[serde(default)]
    pub repair: RepairLoopConfig,

    /// External plant simulator process
    #[serde(default)]
    pub plant: PlantConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supported benchmark domains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Benchmark {
    /// Unmanned underwater vehicle: lateral position `y` and heading `h`
    #[default]
    Uuv,
    /// Mountain car: position `pos` and velocity `vel`
    Mc,
}

impl Benchmark {
    /// Column names of the state features in sample and partition tables.
    pub const fn state_columns(self) -> [&'static str; 2] {
        match self {
            Self::Uuv => ["y", "h"],
            Self::Mc => ["pos", "vel"],
        }
    }
}

impl FromStr for Benchmark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uuv" => Ok(Self::Uuv),
            "mc" => Ok(Self::Mc),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuv => write!(f, "uuv"),
            Self::Mc => write!(f, "mc"),
        }
    }
}

/// Simulated annealing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnnealingConfig {
    /// Standard deviation of the per-coordinate Gaussian perturbation
    #[serde(default = "default_std")]
    pub std: f64,

    /// Initial temperature
    #[serde(default = "default_temperature")]
    pub initial_temperature: f64,

    /// Cooling factor applied every iteration, in (0, 1)
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Fixed iteration budget
    #[serde(default = "default_num_iter")]
    pub num_iter: usize,

    /// Energy deltas below this are accepted outright
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,

    /// Base RNG seed; `None` draws from OS entropy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

const fn default_std() -> f64 {
    0.1
}

const fn default_temperature() -> f64 {
    0.1
}

const fn default_alpha() -> f64 {
    0.95
}

const fn default_num_iter() -> usize {
    200
}

const fn default_acceptance_threshold() -> f64 {
    0.001
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            std: default_std(),
            initial_temperature: default_temperature(),
            alpha: default_alpha(),
            num_iter: default_num_iter(),
            acceptance_threshold: default_acceptance_threshold(),
            seed: None,
        }
    }
}

/// Blend search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlendConfig {
    /// Stop once the weight interval is narrower than this
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Probe the blend line for non-monotonic behavior before searching
    #[serde(default)]
    pub verify_monotonicity: bool,

    /// Number of grid points used by the monotonicity probe
    #[serde(default = "default_monotonicity_grid")]
    pub monotonicity_grid: usize,
}

const fn default_epsilon() -> f64 {
    1e-7
}

const fn default_monotonicity_grid() -> usize {
    64
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            verify_monotonicity: false,
            monotonicity_grid: default_monotonicity_grid(),
        }
    }
}

/// Which network is persisted as the checkpoint of record after an
/// interpolated success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointOfRecord {
    /// The pre-blend annealed candidate
    #[default]
    Annealed,
    /// The blended controller that passed validation
    Blended,
}

/// Energy function used to score annealing candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyKind {
    /// Negative mean robustness over the batch
    #[default]
    NegativeMeanRobustness,
    /// Sum of robustness deficits below zero
    TotalViolation,
}

/// Outer repair loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepairLoopConfig {
    /// Maximum repair attempts on a single region within one run
    #[serde(default = "default_max_passes")]
    pub max_passes_per_region: u32,

    /// Samples per region used to seed the good-state set
    #[serde(default = "default_good_states_per_region")]
    pub good_states_per_region: usize,

    /// Checkpoint persisted after an interpolated success
    #[serde(default)]
    pub checkpoint_of_record: CheckpointOfRecord,

    /// Energy used by the annealer
    #[serde(default)]
    pub energy: EnergyKind,

    /// Wall-clock limit after which the run is cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
}

const fn default_max_passes() -> u32 {
    3
}

const fn default_good_states_per_region() -> usize {
    5
}

impl Default for RepairLoopConfig {
    fn default() -> Self {
        Self {
            max_passes_per_region: default_max_passes(),
            good_states_per_region: default_good_states_per_region(),
            checkpoint_of_record: CheckpointOfRecord::default(),
            energy: EnergyKind::default(),
            time_limit_secs: None,
        }
    }
}

/// External plant simulator process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlantConfig {
    /// Command that starts the simulator
    #[serde(default)]
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Log rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "never".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
