//! Per-iteration repair outcomes and the run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::region::RegionId;

/// Classification of one repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairCase {
    /// Annealing repaired no bad state
    #[serde(rename = "NF")]
    NotFixed,
    /// Annealing repaired bad states without breaking any good state
    #[serde(rename = "NS")]
    NoBreakSuccess,
    /// Good states broke but blending found an acceptable controller
    #[serde(rename = "IS")]
    InterpolatedSuccess,
    /// Good states broke and blending failed
    #[serde(rename = "IF")]
    InterpolatedFailure,
}

impl RepairCase {
    /// Short code used in logs and reports.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFixed => "NF",
            Self::NoBreakSuccess => "NS",
            Self::InterpolatedSuccess => "IS",
            Self::InterpolatedFailure => "IF",
        }
    }

    /// Whether the active controller changed.
    pub const fn accepted(self) -> bool {
        matches!(self, Self::NoBreakSuccess | Self::InterpolatedSuccess)
    }
}

impl fmt::Display for RepairCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a queue head was dropped without a repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoBadStates,
    PassBudgetExhausted,
}

/// Tally of outcome kinds. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairCaseCounters {
    #[serde(rename = "NS")]
    pub no_break_success: u32,
    #[serde(rename = "NF")]
    pub not_fixed: u32,
    #[serde(rename = "IS")]
    pub interpolated_success: u32,
    #[serde(rename = "IF")]
    pub interpolated_failure: u32,
}

impl RepairCaseCounters {
    /// Record one outcome.
    pub fn record(&mut self, case: RepairCase) {
        match case {
            RepairCase::NotFixed => self.not_fixed += 1,
            RepairCase::NoBreakSuccess => self.no_break_success += 1,
            RepairCase::InterpolatedSuccess => self.interpolated_success += 1,
            RepairCase::InterpolatedFailure => self.interpolated_failure += 1,
        }
    }

    /// Count for one outcome.
    pub const fn get(&self, case: RepairCase) -> u32 {
        match case {
            RepairCase::NotFixed => self.not_fixed,
            RepairCase::NoBreakSuccess => self.no_break_success,
            RepairCase::InterpolatedSuccess => self.interpolated_success,
            RepairCase::InterpolatedFailure => self.interpolated_failure,
        }
    }

    /// Total number of classified attempts.
    pub const fn total(&self) -> u32 {
        self.no_break_success + self.not_fixed + self.interpolated_success + self.interpolated_failure
    }
}

/// What happened in one loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u64,
    pub region: RegionId,
    /// `None` when the region was skipped
    pub case: Option<RepairCase>,
    pub skipped: Option<SkipReason>,
    pub bad_states: usize,
    pub repaired_states: usize,
    /// Blend weight when the blend search ran
    pub blend_weight: Option<f64>,
    /// Result of the monotonicity probe, when it ran
    pub blend_monotonic: Option<bool>,
    /// Good-state set size after this iteration
    pub good_states: usize,
    /// Queue contents (head first) after this iteration
    pub queue_after: Vec<RegionId>,
}

/// Summary of a whole repair run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Red regions with bad samples at the first pass
    pub initial_red_regions: usize,
    pub counters: RepairCaseCounters,
    pub iterations: Vec<IterationRecord>,
    pub checkpoints: Vec<PathBuf>,
    pub final_good_states: usize,
    /// Version of the active controller at the end of the run
    pub final_version: u64,
    /// Set when the run stopped on cancellation rather than an empty queue
    pub interrupted: bool,
}
