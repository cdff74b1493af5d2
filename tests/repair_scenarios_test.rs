//! Repair loop scenarios covering each outcome class.
//!
//! All scenarios use the one-parameter linear plant from `common`: the bad
//! state `(1, -1)` is repaired once `p >= 1`, and the good state `(-1, c)`
//! stays good while `p <= c`.

mod common;

use common::{harness, test_config, two_region_samples, FrozenSampler};
use controller_repair::domain::models::{
    CheckpointOfRecord, ControllerCheckpoint, RegionId, RepairCase, SampledState, SkipReason,
};
use controller_repair::services::{RepairEvent, RepairOrchestrator};
use std::sync::Arc;
use tokio::sync::mpsc;

fn initial() -> ControllerCheckpoint {
    ControllerCheckpoint::from_params(vec![0.0])
}

#[tokio::test]
async fn test_candidate_that_breaks_nothing_is_accepted() {
    common::setup_test_logging();
    let samples = two_region_samples(2.5);
    let h = harness(&samples, 2.0);

    let orchestrator = RepairOrchestrator::new(&test_config(11), h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.initial_red_regions, 1);
    assert_eq!(report.counters.no_break_success, 1);
    assert_eq!(report.counters.total(), 1);
    assert!(!report.interrupted);

    let saved = h.store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0.region, RegionId(0));
    assert!((saved[0].1.params[0] - 2.0).abs() < 0.1);
    assert_eq!(report.final_version, 0, "first iteration is numbered 0");

    // Seeded good state plus the repaired bad state
    assert_eq!(report.final_good_states, 2);
    assert!(report.iterations[0].queue_after.is_empty());
}

#[tokio::test]
async fn test_candidate_that_repairs_nothing_is_not_fixed() {
    let samples = two_region_samples(2.5);
    let h = harness(&samples, -5.0);

    let orchestrator = RepairOrchestrator::new(&test_config(12), h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.counters.not_fixed, 1);
    assert_eq!(report.counters.total(), 1);
    assert!(h.store.saved().is_empty(), "nothing is persisted on NF");
    assert!(report.checkpoints.is_empty());
    assert_eq!(report.final_good_states, 1);
    assert_eq!(report.iterations[0].repaired_states, 0);
}

#[tokio::test]
async fn test_blend_rescues_breaking_candidate_and_persists_annealed() {
    let samples = two_region_samples(2.5);
    let h = harness(&samples, 4.0);

    let orchestrator = RepairOrchestrator::new(&test_config(13), h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.counters.interpolated_success, 1);
    let first = &report.iterations[0];
    assert_eq!(first.case, Some(RepairCase::InterpolatedSuccess));
    assert_eq!(first.blend_weight, Some(0.5));

    let saved = h.store.saved();
    assert!((saved[0].1.params[0] - 4.0).abs() < 0.1, "annealed candidate is of record");

    // The annealed candidate broke region 1, which the next pass cannot fix
    // with an energy that keeps pulling toward p = 4.
    assert_eq!(report.counters.not_fixed, 1);
    assert_eq!(report.iterations[1].region, RegionId(1));
    assert_eq!(report.counters.total(), 2);
}

#[tokio::test]
async fn test_blended_checkpoint_of_record() {
    let samples = two_region_samples(2.5);
    let h = harness(&samples, 4.0);
    let mut config = test_config(13);
    config.repair.checkpoint_of_record = CheckpointOfRecord::Blended;

    let orchestrator = RepairOrchestrator::new(&config, h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.counters.interpolated_success, 1);
    assert_eq!(report.counters.total(), 1, "blended controller keeps region 1 green");

    let saved = h.store.saved();
    assert_eq!(saved.len(), 1);
    assert!((saved[0].1.params[0] - 2.0).abs() < 0.1);
}

#[tokio::test]
async fn test_blended_record_protects_only_states_it_satisfies() {
    // (1, -3) needs p >= 3, which the blend at p = 2 does not reach
    let mut samples = two_region_samples(2.5);
    samples.push(SampledState::new(RegionId(0), vec![1.0, -3.0], -3.0));
    let h = harness(&samples, 4.0);
    let mut config = test_config(19);
    config.repair.checkpoint_of_record = CheckpointOfRecord::Blended;

    let orchestrator = RepairOrchestrator::new(&config, h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    let first = &report.iterations[0];
    assert_eq!(first.case, Some(RepairCase::InterpolatedSuccess));
    assert_eq!(first.repaired_states, 2, "the annealed candidate fixes both");
    assert_eq!(first.good_states, 2, "seeded state plus the one the blend fixes");

    let saved = h.store.saved();
    assert_eq!(saved.len(), 1);
    let p = saved[0].1.params[0];
    for (x, c) in [(-1.0, 2.5), (1.0, -1.0)] {
        assert!(x * p + c >= 0.0, "protected state ({x}, {c}) violated at p = {p}");
    }
    assert!(p < 3.0, "(1, -3) stays unrepaired under the blend");

    // The still-bad state comes back, and no blend can satisfy it alongside (-1, 2.5)
    assert_eq!(report.counters.interpolated_failure, 1);
    assert_eq!(report.final_good_states, 2);
}

#[tokio::test]
async fn test_incompatible_constraints_fail_interpolation() {
    // Good state needs p <= 0.5 while the bad state needs p >= 1
    let samples = two_region_samples(0.5);
    let h = harness(&samples, 4.0);

    let orchestrator = RepairOrchestrator::new(&test_config(14), h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.counters.interpolated_failure, 1);
    assert_eq!(report.counters.total(), 1);
    assert!(h.store.saved().is_empty());
    assert!(report.iterations[0].blend_weight.is_some());
    assert_eq!(report.final_good_states, 1, "failed attempts add no good states");
}

#[tokio::test]
async fn test_robust_controller_needs_no_repair() {
    let samples = vec![
        SampledState::new(RegionId(0), vec![15.0, 10.5], 0.8),
        SampledState::new(RegionId(1), vec![15.5, 10.5], 1.2),
    ];
    let h = harness(&samples, 0.0);

    let orchestrator = RepairOrchestrator::new(&test_config(15), h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.initial_red_regions, 0);
    assert_eq!(report.counters.total(), 0);
    assert!(report.iterations.is_empty());
    assert_eq!(h.plant.calls(), 0);
}

#[tokio::test]
async fn test_pass_budget_stops_a_region_that_never_turns_green() {
    let samples = two_region_samples(2.5);
    let mut h = harness(&samples, 2.0);
    // Resampling keeps reporting the original failure
    h.collaborators.sampler = Arc::new(FrozenSampler {
        samples: samples.clone(),
    });
    let mut config = test_config(16);
    config.repair.max_passes_per_region = 2;

    let orchestrator = RepairOrchestrator::new(&config, h.collaborators).unwrap();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert_eq!(report.counters.no_break_success, 2);
    assert_eq!(report.iterations.len(), 3);
    let last = &report.iterations[2];
    assert_eq!(last.skipped, Some(SkipReason::PassBudgetExhausted));
    assert_eq!(last.case, None);
    assert_eq!(last.iteration, 2, "skips still consume an iteration number");
}

#[tokio::test]
async fn test_cancelled_run_reports_interrupted() {
    let samples = two_region_samples(2.5);
    let h = harness(&samples, 2.0);

    let orchestrator = RepairOrchestrator::new(&test_config(17), h.collaborators).unwrap();
    orchestrator.cancellation_token().cancel();
    let report = orchestrator.run(initial(), samples).await.unwrap();

    assert!(report.interrupted);
    assert!(report.iterations.is_empty());
    assert_eq!(report.initial_red_regions, 1);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let samples = two_region_samples(2.5);
    let h = harness(&samples, 2.0);
    let (tx, mut rx) = mpsc::channel(64);

    let orchestrator = RepairOrchestrator::new(&test_config(18), h.collaborators)
        .unwrap()
        .with_events(tx);
    let report = orchestrator.run(initial(), samples).await.unwrap();
    drop(orchestrator);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(RepairEvent::Started { red_regions: 1, .. })));
    assert!(matches!(
        events.last(),
        Some(RepairEvent::Finished { interrupted: false, .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        RepairEvent::Classified {
            case: RepairCase::NoBreakSuccess,
            ..
        }
    )));
    let persisted = events
        .iter()
        .filter(|e| matches!(e, RepairEvent::CheckpointPersisted { .. }))
        .count();
    assert_eq!(persisted, report.checkpoints.len());
}
