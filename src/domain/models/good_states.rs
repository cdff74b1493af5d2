//! The append-only set of states whose satisfied behavior must never regress.

use serde::{Deserialize, Serialize};

use super::sample::StateVector;

/// A protected state and the robustness it had when it was admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodState {
    pub state: StateVector,
    pub prior_robustness: f64,
}

/// Versioned, append-only collection of good states.
///
/// Every call to [`GoodStateSet::extend`] that adds at least one entry bumps
/// the version, so callers can tell which generation of the set a decision
/// was made against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoodStateSet {
    entries: Vec<GoodState>,
    version: u64,
}

impl GoodStateSet {
    /// Create an empty set at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of states.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = GoodState>) {
        let before = self.entries.len();
        self.entries.extend(batch);
        if self.entries.len() > before {
            self.version += 1;
        }
    }

    /// Number of protected states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no states.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current generation of the set.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Protected entries in admission order.
    pub fn entries(&self) -> &[GoodState] {
        &self.entries
    }

    /// Protected states without their prior robustness.
    pub fn states(&self) -> Vec<StateVector> {
        self.entries.iter().map(|g| g.state.clone()).collect()
    }
}

impl FromIterator<GoodState> for GoodStateSet {
    fn from_iter<T: IntoIterator<Item = GoodState>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
