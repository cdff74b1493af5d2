//! Checkpoint store port - load the controller under repair and persist accepted repairs.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::errors::RepairResult;
use crate::domain::models::{CheckpointTag, ControllerCheckpoint};

/// Persistence for controller checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load a controller from `path`.
    async fn load(&self, path: &Path) -> RepairResult<ControllerCheckpoint>;

    /// Persist an accepted checkpoint and its human-readable parameter dump.
    ///
    /// Returns the path of the serialized checkpoint.
    async fn persist(
        &self,
        controller: &ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<PathBuf>;
}
