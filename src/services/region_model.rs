//! Region coloring, repair prioritization, and good-state seeding.
//!
//! Everything here is a pure function of its inputs: identical verifier and
//! sampler output always produce identical colors and queues.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::models::{
    GoodState, GoodStateSet, Region, RegionColor, RegionId, RegionPriority, SampledState, Verdict,
};

/// Color every region seen by either the verifier or the sampler.
///
/// - red: verdict `unsafe`, or any sample with negative robustness
/// - yellow: otherwise, verdict `unknown` or no verdict at all
/// - green: verdict `safe` and every sample non-negative
pub fn color_regions(
    verdicts: &BTreeMap<RegionId, Verdict>,
    samples: &[SampledState],
) -> BTreeMap<RegionId, RegionColor> {
    let mut any_bad: BTreeMap<RegionId, bool> = verdicts.keys().map(|id| (*id, false)).collect();
    for sample in samples {
        *any_bad.entry(sample.region).or_insert(false) |= sample.is_bad();
    }

    any_bad
        .into_iter()
        .map(|(region, has_bad_sample)| {
            let verdict = verdicts.get(&region).copied().unwrap_or(Verdict::Unknown);
            let color = match (verdict, has_bad_sample) {
                (Verdict::Unsafe, _) | (_, true) => RegionColor::Red,
                (Verdict::Unknown, false) => RegionColor::Yellow,
                (Verdict::Safe, false) => RegionColor::Green,
            };
            (region, color)
        })
        .collect()
}

/// Order regions by the mean robustness of their bad samples, most negative first.
///
/// Samples with non-negative robustness are ignored, so a region without bad
/// samples never appears. Ties are broken by region id.
pub fn sort_regions(bad_samples: &[SampledState]) -> Vec<RegionPriority> {
    let mut sums: BTreeMap<RegionId, (f64, usize)> = BTreeMap::new();
    for sample in bad_samples.iter().filter(|s| s.is_bad()) {
        let entry = sums.entry(sample.region).or_insert((0.0, 0));
        entry.0 += sample.robustness;
        entry.1 += 1;
    }

    let mut ordered: Vec<RegionPriority> = sums
        .into_iter()
        .map(|(region, (sum, count))| RegionPriority {
            region,
            avg_robustness: sum / count as f64,
        })
        .collect();

    ordered.sort_by(|a, b| {
        a.avg_robustness
            .total_cmp(&b.avg_robustness)
            .then(a.region.cmp(&b.region))
    });
    ordered
}

/// The repair queue: bad samples of red regions, prioritized by [`sort_regions`].
pub fn red_queue(
    colors: &BTreeMap<RegionId, RegionColor>,
    samples: &[SampledState],
) -> Vec<RegionPriority> {
    let red_bad: Vec<SampledState> = samples
        .iter()
        .filter(|s| s.is_bad() && colors.get(&s.region) == Some(&RegionColor::Red))
        .cloned()
        .collect();
    sort_regions(&red_bad)
}

/// Seed the protected set from the initial sample pass.
///
/// Takes up to `per_region` non-negative samples from each red region and up
/// to `per_region` samples (in input order) from each yellow and green region.
pub fn seed_good_states(
    colors: &BTreeMap<RegionId, RegionColor>,
    samples: &[SampledState],
    per_region: usize,
) -> GoodStateSet {
    let mut taken: BTreeMap<RegionId, usize> = BTreeMap::new();
    let mut red = Vec::new();
    let mut others = Vec::new();

    for sample in samples {
        let Some(color) = colors.get(&sample.region) else {
            continue;
        };
        let eligible = match color {
            RegionColor::Red => !sample.is_bad(),
            RegionColor::Yellow | RegionColor::Green => true,
        };
        if !eligible {
            continue;
        }
        let count = taken.entry(sample.region).or_insert(0);
        if *count >= per_region {
            continue;
        }
        *count += 1;

        let good = GoodState {
            state: sample.state.clone(),
            prior_robustness: sample.robustness,
        };
        if *color == RegionColor::Red {
            red.push(good);
        } else {
            others.push(good);
        }
    }

    red.into_iter().chain(others).collect()
}

/// Display row combining a region's bounds, color, and sample statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub region: RegionId,
    pub color: RegionColor,
    pub samples: usize,
    pub bad_samples: usize,
    /// Mean robustness over all samples of the region
    pub mean_robustness: Option<f64>,
    pub bounds: Option<Region>,
}

/// Summarize each colored region, attaching bounds from the partition when known.
pub fn summarize_regions(
    colors: &BTreeMap<RegionId, RegionColor>,
    samples: &[SampledState],
    partition: &[Region],
) -> Vec<RegionSummary> {
    let bounds: BTreeMap<RegionId, &Region> = partition.iter().map(|r| (r.id, r)).collect();
    colors
        .iter()
        .map(|(region, color)| {
            let mine: Vec<&SampledState> = samples.iter().filter(|s| s.region == *region).collect();
            let mean_robustness = if mine.is_empty() {
                None
            } else {
                Some(mine.iter().map(|s| s.robustness).sum::<f64>() / mine.len() as f64)
            };
            RegionSummary {
                region: *region,
                color: *color,
                samples: mine.len(),
                bad_samples: mine.iter().filter(|s| s.is_bad()).count(),
                mean_robustness,
                bounds: bounds.get(region).map(|r| (*r).clone()),
            }
        })
        .collect()
}

/// Region ids in the queue, head first.
pub fn queue_ids(queue: &[RegionPriority]) -> Vec<RegionId> {
    queue.iter().map(|p| p.region).collect()
}

/// Regions of the given color.
pub fn regions_with_color(
    colors: &BTreeMap<RegionId, RegionColor>,
    color: RegionColor,
) -> BTreeSet<RegionId> {
    colors
        .iter()
        .filter(|(_, c)| **c == color)
        .map(|(id, _)| *id)
        .collect()
}
