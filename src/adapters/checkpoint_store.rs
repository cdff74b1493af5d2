//! File-backed checkpoint store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{CheckpointTag, ControllerCheckpoint};
use crate::domain::ports::CheckpointStore;

/// Writes accepted checkpoints as `{prefix}_{tag}.json` plus a `.yml` dump.
///
/// Controllers are loaded from either format, chosen by file extension.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    output_dir: PathBuf,
    prefix: String,
}

impl FileCheckpointStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: "tanh".to_string(),
        }
    }

    fn paths(&self, tag: CheckpointTag) -> (PathBuf, PathBuf) {
        let stem = format!("{}_{tag}", self.prefix);
        (
            self.output_dir.join(format!("{stem}.json")),
            self.output_dir.join(format!("{stem}.yml")),
        )
    }
}

fn parse(path: &Path, raw: &str) -> RepairResult<ControllerCheckpoint> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let checkpoint: ControllerCheckpoint = match extension.as_deref() {
        Some("json") => serde_json::from_str(raw)?,
        Some("yml" | "yaml") => serde_yaml::from_str(raw)?,
        other => {
            return Err(RepairError::CheckpointError(format!(
                "{}: unsupported checkpoint format {other:?}",
                path.display()
            )))
        }
    };

    if checkpoint.architecture.layers.is_empty() {
        return Ok(checkpoint);
    }
    // Re-check the parameter count against the declared shape
    let version = checkpoint.version;
    ControllerCheckpoint::new(checkpoint.architecture, checkpoint.params)
        .map(|c| c.with_version(version))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, path: &Path) -> RepairResult<ControllerCheckpoint> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RepairError::CheckpointError(format!("{}: {e}", path.display()))
        })?;
        let checkpoint = parse(path, &raw)?;
        debug!(
            path = %path.display(),
            params = checkpoint.len(),
            version = checkpoint.version,
            "checkpoint loaded"
        );
        Ok(checkpoint)
    }

    async fn persist(
        &self,
        controller: &ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let (json_path, yaml_path) = self.paths(tag);

        let json = serde_json::to_string_pretty(controller)?;
        let yaml = serde_yaml::to_string(controller)?;
        tokio::fs::write(&json_path, json).await?;
        tokio::fs::write(&yaml_path, yaml).await?;

        debug!(path = %json_path.display(), "checkpoint written");
        Ok(json_path)
    }
}
