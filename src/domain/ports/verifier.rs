//! Verifier port - per-region reachability verdicts.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::domain::errors::RepairResult;
use crate::domain::models::{ControllerCheckpoint, RegionId, Verdict};

/// Source of reachability verdicts for the fixed region partition.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verdict for every region the verifier knows about under `controller`.
    async fn verdicts(
        &self,
        controller: &ControllerCheckpoint,
    ) -> RepairResult<BTreeMap<RegionId, Verdict>>;
}
