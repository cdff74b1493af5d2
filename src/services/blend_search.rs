//! Interpolated blend search between a safe controller and a repair candidate.
//!
//! Bisects the mixing weight `w` of `w * net_lo + (1 - w) * net_hi`, moving
//! toward `net_lo` while any good state is broken and toward `net_hi` while
//! no bad state is repaired. Both endpoints are replaced by the midpoint as
//! the interval shrinks, so later midpoints blend already-blended networks.
//!
//! The search assumes the trade-off along the blend line is monotonic: good
//! states only break as `w` decreases and bad states only get repaired as
//! `w` decreases. Nothing enforces this. [`BlendSearch::probe_monotonicity`]
//! samples the line densely to detect where it does not hold.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{blend, BlendConfig, ControllerCheckpoint, StateVector};
use crate::domain::ports::RobustnessOracle;

/// Result of a blend search.
#[derive(Debug, Clone)]
pub struct BlendOutcome {
    /// Last midpoint controller
    pub controller: ControllerCheckpoint,
    /// Last midpoint weight `w_mid`
    pub weight: f64,
    /// Weight of the original `net_lo` inside the returned controller
    pub effective_weight: f64,
    pub success: bool,
    pub iterations: usize,
    /// `w_hi - w_lo` when the search stopped
    pub interval_width: f64,
}

/// One grid point of a monotonicity probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendProbe {
    pub weight: f64,
    pub good_intact: bool,
    pub bad_repaired: bool,
}

/// Dense sampling of the blend line.
#[derive(Debug, Clone, Serialize)]
pub struct MonotonicityReport {
    /// Grid points ordered by increasing weight (from `net_hi` toward `net_lo`)
    pub probes: Vec<BlendProbe>,
    /// Sign changes of "all good states intact" along the grid
    pub good_flips: usize,
    /// Sign changes of "some bad state repaired" along the grid
    pub bad_flips: usize,
}

impl MonotonicityReport {
    /// True when each predicate changes at most once along the line.
    pub const fn is_monotonic(&self) -> bool {
        self.good_flips <= 1 && self.bad_flips <= 1
    }
}

/// Convex-combination bisection search.
#[derive(Debug, Clone)]
pub struct BlendSearch {
    config: BlendConfig,
}

impl BlendSearch {
    /// Create a search with the given configuration.
    pub fn new(config: BlendConfig) -> RepairResult<Self> {
        if config.epsilon.is_nan() || config.epsilon <= 0.0 {
            return Err(RepairError::InvalidConfig(format!(
                "blend epsilon must be positive, got {}",
                config.epsilon
            )));
        }
        Ok(Self { config })
    }

    /// Blend configuration in use.
    pub const fn config(&self) -> &BlendConfig {
        &self.config
    }

    /// Upper bound on bisection steps for the configured epsilon.
    pub fn max_iterations(&self) -> usize {
        (1.0 / self.config.epsilon).log2().ceil().max(0.0) as usize
    }

    /// Search for a blend that keeps every good state and repairs a bad one.
    #[instrument(skip_all, fields(bad = bad_states.len(), good = good_states.len()))]
    pub fn search(
        &self,
        net_lo: &ControllerCheckpoint,
        net_hi: &ControllerCheckpoint,
        bad_states: &[StateVector],
        good_states: &[StateVector],
        oracle: &dyn RobustnessOracle,
        cancel: &CancellationToken,
    ) -> RepairResult<BlendOutcome> {
        let mut w_lo = 0.0_f64;
        let mut w_hi = 1.0_f64;
        let mut w_mid = 0.5_f64;
        let mut lo = net_lo.clone();
        let mut hi = net_hi.clone();
        let mut mid = net_hi.clone();
        // Weight of the original net_lo carried by each endpoint
        let mut coef_lo = 1.0_f64;
        let mut coef_hi = 0.0_f64;
        let mut coef_mid = 0.0_f64;
        let mut iterations = 0;

        while w_hi - w_lo >= self.config.epsilon {
            if cancel.is_cancelled() {
                return Err(RepairError::Cancelled);
            }
            iterations += 1;

            mid = blend(&lo, &hi, w_mid)?;
            coef_mid = w_mid * coef_lo + (1.0 - w_mid) * coef_hi;

            let good = oracle.robustness_batch(&mid, good_states)?;
            let min_good = good.iter().copied().fold(f64::INFINITY, f64::min);
            debug!(w_mid, min_good, "blend step: good states");

            if good.is_empty() || min_good < 0.0 {
                w_hi = w_mid;
                w_mid = (w_lo + w_hi) / 2.0;
                hi = mid.clone();
                coef_hi = coef_mid;
                continue;
            }

            let bad = oracle.robustness_batch(&mid, bad_states)?;
            let max_bad = bad.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            debug!(w_mid, max_bad, "blend step: bad states");

            if bad.is_empty() || max_bad >= 0.0 {
                debug!(w_mid, iterations, "blend search succeeded");
                return Ok(BlendOutcome {
                    controller: mid,
                    weight: w_mid,
                    effective_weight: coef_mid,
                    success: true,
                    iterations,
                    interval_width: w_hi - w_lo,
                });
            }

            w_lo = w_mid;
            w_mid = (w_lo + w_hi) / 2.0;
            lo = mid.clone();
            coef_lo = coef_mid;
        }

        debug!(iterations, "blend search exhausted its interval");
        Ok(BlendOutcome {
            controller: mid,
            weight: w_mid,
            effective_weight: coef_mid,
            success: false,
            iterations,
            interval_width: w_hi - w_lo,
        })
    }

    /// Evaluate both predicates at `grid` evenly spaced weights in `[0, 1]`.
    pub fn probe_monotonicity(
        &self,
        net_lo: &ControllerCheckpoint,
        net_hi: &ControllerCheckpoint,
        bad_states: &[StateVector],
        good_states: &[StateVector],
        oracle: &dyn RobustnessOracle,
        cancel: &CancellationToken,
    ) -> RepairResult<MonotonicityReport> {
        let grid = self.config.monotonicity_grid.max(2);
        let mut probes = Vec::with_capacity(grid);

        for i in 0..grid {
            if cancel.is_cancelled() {
                return Err(RepairError::Cancelled);
            }
            let weight = i as f64 / (grid - 1) as f64;
            let controller = blend(net_lo, net_hi, weight)?;
            let good = oracle.robustness_batch(&controller, good_states)?;
            let bad = oracle.robustness_batch(&controller, bad_states)?;
            probes.push(BlendProbe {
                weight,
                good_intact: good.iter().all(|r| *r >= 0.0),
                bad_repaired: bad.iter().any(|r| *r >= 0.0),
            });
        }

        let flips = |pick: fn(&BlendProbe) -> bool| {
            probes
                .windows(2)
                .filter(|pair| pick(&pair[0]) != pick(&pair[1]))
                .count()
        };
        let good_flips = flips(|p| p.good_intact);
        let bad_flips = flips(|p| p.bad_repaired);

        Ok(MonotonicityReport {
            probes,
            good_flips,
            bad_flips,
        })
    }
}
