//! Verifier adapter backed by a fixed verifier output table.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::tables::read_verdicts;
use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{ControllerCheckpoint, RegionId, Verdict};
use crate::domain::ports::Verifier;

/// Reads `region,verdict` rows from a CSV produced by an external verifier.
///
/// The verifier is not re-run after a repair; every call re-reads the file,
/// so the verdicts do not depend on the controller passed in.
#[derive(Debug, Clone)]
pub struct CsvVerifier {
    path: PathBuf,
}

impl CsvVerifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Verifier for CsvVerifier {
    async fn verdicts(
        &self,
        _controller: &ControllerCheckpoint,
    ) -> RepairResult<BTreeMap<RegionId, Verdict>> {
        let path = self.path.clone();
        let verdicts = tokio::task::spawn_blocking(move || read_verdicts(&path))
            .await?
            .map_err(|e| RepairError::VerifierFailed(e.to_string()))?;
        debug!(path = %self.path.display(), regions = verdicts.len(), "verifier output loaded");
        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_verdicts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("verifier.csv");
        std::fs::write(&path, "region,verdict\n0,unsafe\n1,safe\n").unwrap();

        let verifier = CsvVerifier::new(&path);
        let verdicts = verifier
            .verdicts(&ControllerCheckpoint::from_params(vec![0.0]))
            .await
            .unwrap();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[&RegionId(0)], Verdict::Unsafe);
    }

    #[tokio::test]
    async fn test_missing_file_is_verifier_failure() {
        let verifier = CsvVerifier::new("/nonexistent/verifier.csv");
        let result = verifier
            .verdicts(&ControllerCheckpoint::from_params(vec![0.0]))
            .await;
        assert!(matches!(result, Err(RepairError::VerifierFailed(_))));
    }
}
