//! Sampler port - fresh per-state robustness after a controller update.

use async_trait::async_trait;

use crate::domain::errors::RepairResult;
use crate::domain::models::{CheckpointTag, ControllerCheckpoint, SampledState};

/// Produces `(region, state, robustness)` samples for a controller.
///
/// Invoked once per accepted repair; every call must reflect the controller
/// it is given rather than any cached result.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Sample the partition under `controller`. `tag` names the checkpoint
    /// the samples belong to.
    async fn sample(
        &self,
        controller: &ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<Vec<SampledState>>;
}
