//! Repair orchestrator - the outer loop over red regions.
//!
//! Each iteration takes the head of the red-region queue, anneals a copy of
//! the active controller on that region's bad states, and classifies the
//! attempt:
//!
//! - **NF**: no bad state repaired. The region is dropped from the queue.
//! - **NS**: some bad state repaired and no good state broken. The candidate
//!   becomes active and the queue is rebuilt from fresh samples.
//! - **IS**: good states broke but the blend search found a compromise. The
//!   checkpoint of record becomes active and the queue is rebuilt.
//! - **IF**: good states broke and blending failed. The region is dropped.
//!
//! Every region can be attempted at most `max_passes_per_region` times, which
//! bounds the loop even when re-sampling keeps a region red.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{RepairError, RepairResult};
use crate::domain::models::{
    bad_states_of, CheckpointOfRecord, CheckpointTag, Config, ControllerCheckpoint, GoodState,
    GoodStateSet, IterationRecord, RegionId, RegionPriority, RepairCase,
    RepairCaseCounters, RepairLoopConfig, RepairReport, SampledState, SkipReason, StateVector,
};
use crate::domain::ports::{CheckpointStore, EnergyFunction, RobustnessOracle, Sampler, Verifier};
use crate::services::annealer::{Annealer, AnnealingOutcome};
use crate::services::blend_search::{BlendOutcome, BlendSearch};
use crate::services::region_model::{color_regions, queue_ids, red_queue, seed_good_states};

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum RepairEvent {
    /// Initial coloring done.
    Started {
        red_regions: usize,
        good_states: usize,
    },
    /// A region is about to be annealed.
    IterationStarted {
        iteration: u64,
        region: RegionId,
        bad_states: usize,
    },
    /// Annealing finished for the current region.
    AnnealingFinished {
        iteration: u64,
        initial_energy: f64,
        final_energy: f64,
        accepted: usize,
    },
    /// Blend search finished for the current region.
    BlendFinished {
        iteration: u64,
        weight: f64,
        success: bool,
    },
    /// The blend line did not behave monotonically.
    NonMonotonicBlend {
        iteration: u64,
        good_flips: usize,
        bad_flips: usize,
    },
    /// An attempt was classified.
    Classified {
        iteration: u64,
        region: RegionId,
        case: RepairCase,
    },
    /// A queue head was dropped without an attempt.
    Skipped {
        iteration: u64,
        region: RegionId,
        reason: SkipReason,
    },
    /// A new checkpoint became active.
    CheckpointPersisted { path: PathBuf },
    /// The loop ended.
    Finished {
        counters: RepairCaseCounters,
        interrupted: bool,
    },
}

/// External collaborators used by the loop.
#[derive(Clone)]
pub struct RepairCollaborators {
    pub verifier: Arc<dyn Verifier>,
    pub sampler: Arc<dyn Sampler>,
    pub oracle: Arc<dyn RobustnessOracle>,
    pub energy: Arc<dyn EnergyFunction>,
    pub store: Arc<dyn CheckpointStore>,
}

/// Mutable state of one run. The active controller lives only here.
struct RunState {
    active: ControllerCheckpoint,
    samples: Vec<SampledState>,
    queue: Vec<RegionPriority>,
    good_states: GoodStateSet,
    passes: HashMap<RegionId, u32>,
    counters: RepairCaseCounters,
    iteration: u64,
    checkpoints: Vec<PathBuf>,
    records: Vec<IterationRecord>,
}

impl RunState {
    fn drop_region(&mut self, region: RegionId) {
        self.queue.retain(|p| p.region != region);
    }

    fn record(
        &self,
        iteration: u64,
        region: RegionId,
        case: Option<RepairCase>,
        skipped: Option<SkipReason>,
    ) -> IterationRecord {
        IterationRecord {
            iteration,
            region,
            case,
            skipped,
            bad_states: 0,
            repaired_states: 0,
            blend_weight: None,
            blend_monotonic: None,
            good_states: self.good_states.len(),
            queue_after: queue_ids(&self.queue),
        }
    }
}

/// Drives the repair loop from an initial controller to an empty queue.
pub struct RepairOrchestrator {
    annealer: Annealer,
    blend: BlendSearch,
    config: RepairLoopConfig,
    collaborators: RepairCollaborators,
    event_tx: Option<mpsc::Sender<RepairEvent>>,
    cancel: CancellationToken,
}

impl RepairOrchestrator {
    /// Build an orchestrator, validating the annealing and blend parameters.
    pub fn new(config: &Config, collaborators: RepairCollaborators) -> RepairResult<Self> {
        Ok(Self {
            annealer: Annealer::new(config.annealing.clone())?,
            blend: BlendSearch::new(config.blend.clone())?,
            config: config.repair.clone(),
            collaborators,
            event_tx: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Send progress events to `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<RepairEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run at the next annealing step or bisection step.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn emit(&self, event: RepairEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run the loop until the queue is empty or the run is cancelled.
    ///
    /// `samples` is the initial sampling pass for `initial`. Collaborator
    /// failures abort the run; cancellation returns a report marked
    /// interrupted.
    pub async fn run(
        &self,
        initial: ControllerCheckpoint,
        samples: Vec<SampledState>,
    ) -> RepairResult<RepairReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let verdicts = self.collaborators.verifier.verdicts(&initial).await?;
        let colors = color_regions(&verdicts, &samples);
        let queue = red_queue(&colors, &samples);
        let good_states = seed_good_states(&colors, &samples, self.config.good_states_per_region);
        let initial_red_regions = queue.len();

        info!(
            %run_id,
            red_regions = initial_red_regions,
            good_states = good_states.len(),
            "starting repair"
        );
        self.emit(RepairEvent::Started {
            red_regions: initial_red_regions,
            good_states: good_states.len(),
        })
        .await;

        let mut state = RunState {
            active: initial,
            samples,
            queue,
            good_states,
            passes: HashMap::new(),
            counters: RepairCaseCounters::default(),
            iteration: 0,
            checkpoints: Vec::new(),
            records: Vec::new(),
        };
        let mut interrupted = false;

        while let Some(head) = state.queue.first().map(|p| p.region) {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let iteration = state.iteration;
            state.iteration += 1;
            let span = info_span!("repair_iteration", iteration, region = %head);

            match self.step(&mut state, iteration, head).instrument(span).await {
                Ok(record) => state.records.push(record),
                Err(e) if e.is_cancelled() => {
                    interrupted = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if interrupted {
            warn!(iterations = state.records.len(), "repair interrupted");
        }
        info!(
            counters = ?state.counters,
            good_states = state.good_states.len(),
            "repair finished"
        );
        self.emit(RepairEvent::Finished {
            counters: state.counters,
            interrupted,
        })
        .await;

        Ok(RepairReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            initial_red_regions,
            counters: state.counters,
            iterations: state.records,
            checkpoints: state.checkpoints,
            final_good_states: state.good_states.len(),
            final_version: state.active.version,
            interrupted,
        })
    }

    /// One attempt on `region`, the current queue head.
    async fn step(
        &self,
        state: &mut RunState,
        iteration: u64,
        region: RegionId,
    ) -> RepairResult<IterationRecord> {
        let bad_states = bad_states_of(&state.samples, region);
        let passes = state.passes.get(&region).copied().unwrap_or(0);

        let skip = if bad_states.is_empty() {
            Some(SkipReason::NoBadStates)
        } else if passes >= self.config.max_passes_per_region {
            Some(SkipReason::PassBudgetExhausted)
        } else {
            None
        };
        if let Some(reason) = skip {
            info!(?reason, "skipping region");
            state.drop_region(region);
            self.emit(RepairEvent::Skipped {
                iteration,
                region,
                reason,
            })
            .await;
            return Ok(state.record(iteration, region, None, Some(reason)));
        }
        state.passes.insert(region, passes + 1);

        self.emit(RepairEvent::IterationStarted {
            iteration,
            region,
            bad_states: bad_states.len(),
        })
        .await;

        let annealed = self.anneal(iteration, region, &state.active, &bad_states).await?;
        self.emit(RepairEvent::AnnealingFinished {
            iteration,
            initial_energy: annealed.initial_energy,
            final_energy: annealed.final_energy,
            accepted: annealed.accepted,
        })
        .await;
        let candidate = annealed.controller.with_version(iteration);

        // Which bad states does the candidate repair?
        let bad_after = self.evaluate(&candidate, &bad_states).await?;
        let repaired = satisfied(&bad_states, &bad_after);
        debug!(
            mean_before = mean(state.samples.iter().filter(|s| s.region == region && s.is_bad()).map(|s| s.robustness)),
            mean_after = mean(bad_after.iter().copied()),
            repaired = repaired.len(),
            "bad states rescored"
        );

        let mut record = state.record(iteration, region, None, None);
        record.bad_states = bad_states.len();
        record.repaired_states = repaired.len();

        if repaired.is_empty() {
            state.drop_region(region);
            return self
                .classify(state, record, RepairCase::NotFixed)
                .await;
        }

        // Does the candidate break anything already protected?
        let good = state.good_states.states();
        let good_after = self.evaluate(&candidate, &good).await?;
        let broken = good_after.iter().filter(|r| **r < 0.0).count();
        debug!(good = good.len(), broken, "good states rescored");

        if broken == 0 {
            state.good_states.extend(repaired);
            let tag = CheckpointTag { iteration, region };
            self.accept(state, candidate, tag).await?;
            return self
                .classify(state, record, RepairCase::NoBreakSuccess)
                .await;
        }

        let (outcome, monotonic) = self
            .blend(iteration, &state.active, &candidate, &bad_states, &good)
            .await?;
        record.blend_weight = Some(outcome.weight);
        record.blend_monotonic = monotonic;
        self.emit(RepairEvent::BlendFinished {
            iteration,
            weight: outcome.weight,
            success: outcome.success,
        })
        .await;

        if outcome.success {
            info!(
                weight = outcome.weight,
                effective_weight = outcome.effective_weight,
                iterations = outcome.iterations,
                "blend search succeeded"
            );
            state.drop_region(region);
            let (of_record, protected) = match self.config.checkpoint_of_record {
                CheckpointOfRecord::Annealed => (candidate, repaired),
                CheckpointOfRecord::Blended => {
                    // Only states the blended controller itself satisfies may be protected
                    let blended = outcome.controller.with_version(iteration);
                    let under_blend = self.evaluate(&blended, &bad_states).await?;
                    (blended, satisfied(&bad_states, &under_blend))
                }
            };
            debug!(protected = protected.len(), "repaired states folded into good set");
            state.good_states.extend(protected);
            let tag = CheckpointTag { iteration, region };
            self.accept(state, of_record, tag).await?;
            self.classify(state, record, RepairCase::InterpolatedSuccess)
                .await
        } else {
            state.drop_region(region);
            self.classify(state, record, RepairCase::InterpolatedFailure)
                .await
        }
    }

    async fn classify(
        &self,
        state: &mut RunState,
        mut record: IterationRecord,
        case: RepairCase,
    ) -> RepairResult<IterationRecord> {
        state.counters.record(case);
        record.case = Some(case);
        record.good_states = state.good_states.len();
        record.queue_after = queue_ids(&state.queue);
        info!(
            case = case.code(),
            repaired = record.repaired_states,
            bad = record.bad_states,
            remaining = state.queue.len(),
            "region classified"
        );
        self.emit(RepairEvent::Classified {
            iteration: record.iteration,
            region: record.region,
            case,
        })
        .await;
        Ok(record)
    }

    /// Make `controller` active, persist it, and rebuild colors and queue from fresh samples.
    async fn accept(
        &self,
        state: &mut RunState,
        controller: ControllerCheckpoint,
        tag: CheckpointTag,
    ) -> RepairResult<()> {
        let path = self.collaborators.store.persist(&controller, tag).await?;
        info!(path = %path.display(), version = controller.version, "checkpoint persisted");
        state.checkpoints.push(path.clone());
        state.active = controller;
        self.emit(RepairEvent::CheckpointPersisted { path }).await;

        let samples = self.collaborators.sampler.sample(&state.active, tag).await?;
        let verdicts = self.collaborators.verifier.verdicts(&state.active).await?;
        let colors = color_regions(&verdicts, &samples);
        state.queue = red_queue(&colors, &samples);
        state.samples = samples;
        debug!(queue = ?queue_ids(&state.queue), "queue recomputed");
        Ok(())
    }

    async fn anneal(
        &self,
        iteration: u64,
        region: RegionId,
        active: &ControllerCheckpoint,
        bad_states: &[StateVector],
    ) -> RepairResult<AnnealingOutcome> {
        let annealer = self.annealer.clone();
        let energy = Arc::clone(&self.collaborators.energy);
        let cancel = self.cancel.clone();
        let active = active.clone();
        let batch = bad_states.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut rng = annealer.rng_for(iteration);
            annealer.anneal(region, &active, &batch, energy.as_ref(), &mut rng, &cancel)
        })
        .await?
    }

    async fn evaluate(
        &self,
        controller: &ControllerCheckpoint,
        states: &[StateVector],
    ) -> RepairResult<Vec<f64>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let oracle = Arc::clone(&self.collaborators.oracle);
        let controller = controller.clone();
        let states = states.to_vec();
        tokio::task::spawn_blocking(move || oracle.robustness_batch(&controller, &states)).await?
    }

    /// Blend between the active controller and the candidate, probing the line when configured.
    async fn blend(
        &self,
        iteration: u64,
        active: &ControllerCheckpoint,
        candidate: &ControllerCheckpoint,
        bad_states: &[StateVector],
        good_states: &[StateVector],
    ) -> RepairResult<(BlendOutcome, Option<bool>)> {
        let search = self.blend.clone();
        let oracle = Arc::clone(&self.collaborators.oracle);
        let cancel = self.cancel.clone();
        let lo = active.clone();
        let hi = candidate.clone();
        let bad = bad_states.to_vec();
        let good = good_states.to_vec();

        let (outcome, probe) = tokio::task::spawn_blocking(move || {
            let outcome = search.search(&lo, &hi, &bad, &good, oracle.as_ref(), &cancel)?;
            let probe = if search.config().verify_monotonicity {
                Some(search.probe_monotonicity(&lo, &hi, &bad, &good, oracle.as_ref(), &cancel)?)
            } else {
                None
            };
            Ok::<_, RepairError>((outcome, probe))
        })
        .await??;

        let monotonic = probe.map(|report| {
            if !report.is_monotonic() {
                warn!(
                    good_flips = report.good_flips,
                    bad_flips = report.bad_flips,
                    "blend line is not monotonic"
                );
            }
            (report.is_monotonic(), report.good_flips, report.bad_flips)
        });
        if let Some((false, good_flips, bad_flips)) = monotonic {
            self.emit(RepairEvent::NonMonotonicBlend {
                iteration,
                good_flips,
                bad_flips,
            })
            .await;
        }

        Ok((outcome, monotonic.map(|(ok, _, _)| ok)))
    }
}

/// States whose robustness is non-negative, paired with that robustness.
fn satisfied(states: &[StateVector], robustness: &[f64]) -> Vec<GoodState> {
    states
        .iter()
        .zip(robustness)
        .filter(|(_, r)| **r >= 0.0)
        .map(|(s, r)| GoodState {
            state: s.clone(),
            prior_robustness: *r,
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
