//! Domain errors for the controller repair system.

use thiserror::Error;

use super::models::RegionId;

/// Domain-level errors that can occur while repairing a controller.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Architecture mismatch: expected {expected} parameters, found {found}")]
    ArchitectureMismatch { expected: usize, found: usize },

    #[error("Invalid blend weight: {0} (must be within [0, 1])")]
    InvalidWeight(f64),

    #[error("Empty bad-state batch for region {0}")]
    EmptyBatch(RegionId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Repair cancelled")]
    Cancelled,

    #[error("Verifier failed: {0}")]
    VerifierFailed(String),

    #[error("Sampler failed: {0}")]
    SamplerFailed(String),

    #[error("Plant simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    #[error("Malformed input {path}: {reason}")]
    MalformedInput { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl RepairError {
    /// Returns true if this error came from cancellation rather than a failure.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result alias for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

impl From<serde_json::Error> for RepairError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RepairError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RepairError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
