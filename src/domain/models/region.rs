//! Region types: cells of the initial-state partition that are colored and repaired independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a region within the initial-state partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed interval `[lo, hi]` along one state dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// Create a new interval.
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Check whether `x` lies inside the interval.
    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }
}

/// A cell of the initial-state partition.
///
/// Bounds are fixed for the lifetime of a run; color and score are derived
/// from verifier and sampler output and refreshed whenever the active
/// controller changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    /// One interval per state dimension
    pub bounds: Vec<Interval>,
}

impl Region {
    /// Check whether a state lies inside this region's bounding box.
    pub fn contains(&self, state: &[f64]) -> bool {
        state.len() == self.bounds.len()
            && self
                .bounds
                .iter()
                .zip(state)
                .all(|(interval, x)| interval.contains(*x))
    }
}

/// Traffic-light classification of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionColor {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for RegionColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Yellow => write!(f, "yellow"),
            Self::Green => write!(f, "green"),
        }
    }
}

/// Reachability verdict reported by the verifier for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Unsafe,
    Unknown,
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" | "1" | "true" => Ok(Self::Safe),
            "unsafe" | "0" | "false" => Ok(Self::Unsafe),
            "unknown" | "-1" => Ok(Self::Unknown),
            other => Err(format!("unrecognized verdict '{other}'")),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Unsafe => write!(f, "unsafe"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Entry of the repair priority queue: a red region and the mean robustness
/// of its bad samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionPriority {
    pub region: RegionId,
    pub avg_robustness: f64,
}
