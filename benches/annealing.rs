//! Annealing and blend search throughput on a synthetic plant.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use controller_repair::domain::errors::RepairResult;
use controller_repair::domain::models::{
    AnnealingConfig, BlendConfig, ControllerCheckpoint, RegionId, StateVector,
};
use controller_repair::domain::ports::{EnergyFunction, RobustnessOracle};
use controller_repair::services::{Annealer, BlendSearch};

/// Robustness is the dot product of parameters and state, minus one.
struct DotPlant;

impl RobustnessOracle for DotPlant {
    fn robustness(&self, controller: &ControllerCheckpoint, state: &[f64]) -> RepairResult<f64> {
        Ok(controller
            .params
            .iter()
            .zip(state.iter().cycle())
            .map(|(p, s)| p * s)
            .sum::<f64>()
            - 1.0)
    }
}

struct MeanViolation;

impl EnergyFunction for MeanViolation {
    fn name(&self) -> &'static str {
        "mean_violation"
    }

    fn score(&self, states: &[StateVector], controller: &ControllerCheckpoint) -> RepairResult<f64> {
        let r = DotPlant.robustness_batch(controller, states)?;
        Ok(-r.iter().sum::<f64>() / r.len() as f64)
    }
}

fn states(n: usize) -> Vec<StateVector> {
    (0..n)
        .map(|i| vec![(i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()])
        .collect()
}

fn bench_anneal(c: &mut Criterion) {
    let mut group = c.benchmark_group("anneal");
    let annealer = Annealer::new(AnnealingConfig {
        num_iter: 50,
        seed: Some(1),
        ..AnnealingConfig::default()
    })
    .unwrap();

    for params in [64usize, 1024] {
        let controller = ControllerCheckpoint::from_params(vec![0.01; params]);
        let batch = states(32);
        group.bench_with_input(BenchmarkId::from_parameter(params), &params, |b, _| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(7);
                annealer
                    .anneal(
                        RegionId(0),
                        black_box(&controller),
                        &batch,
                        &MeanViolation,
                        &mut rng,
                        &CancellationToken::new(),
                    )
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_blend_search(c: &mut Criterion) {
    let search = BlendSearch::new(BlendConfig::default()).unwrap();
    let lo = ControllerCheckpoint::from_params(vec![0.0; 256]);
    let hi = ControllerCheckpoint::from_params(vec![0.5; 256]);
    // Unreachable predicates force the full bisection
    let bad = vec![vec![0.0, 0.0]];
    let good = states(16);

    c.bench_function("blend_search_exhaustive", |b| {
        b.iter(|| {
            search
                .search(&lo, &hi, &bad, &good, &DotPlant, &CancellationToken::new())
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_anneal, bench_blend_search);
criterion_main!(benches);
