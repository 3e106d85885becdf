//! Forwarding decision benchmarks
//!
//! Benchmarks for the per-Interest hot paths:
//! - Link expiration and availability
//! - TOPSIS and normalized-sum selection
//! - Path-building candidate scoring
//!
//! Run with: cargo bench -p vanet-strategy

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use vanet_core::{Kinematics, NodeId, Vec3};
use vanet_strategy::discovery::{PathBuilder, RouteCost, ScoreWeights};
use vanet_strategy::link_model::{LetMode, link_expiration_time};
use vanet_strategy::selector::{Candidate, Criterion as Rank, Topsis, select_normalized_sum};
use vanet_strategy::{LinkModel, StrategyConfig};

// ============================================================================
// Helper Functions
// ============================================================================

fn make_highway(count: usize, spacing: f64) -> Vec<Kinematics> {
    (0..count)
        .map(|i| {
            let lane = (i % 2) as f64 * 4.0;
            let speed = if i % 2 == 0 { 25.0 } else { -22.0 };
            Kinematics::new(
                Vec3::planar(i as f64 * spacing, lane),
                Vec3::planar(speed, 0.0),
            )
        })
        .collect()
}

fn make_candidates(count: usize, width: usize) -> Vec<Candidate<usize>> {
    (0..count)
        .map(|i| {
            let metrics = (0..width)
                .map(|j| ((i * 7 + j * 13) % 17) as f64 + 1.0)
                .collect();
            Candidate::new(i, metrics)
        })
        .collect()
}

// ============================================================================
// Link Model Benchmarks
// ============================================================================

fn bench_link_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_model");
    let nodes = make_highway(2, 80.0);
    let model = LinkModel::new(200.0);

    group.bench_function("let_guarded", |b| {
        b.iter(|| {
            link_expiration_time(
                black_box(&nodes[0]),
                black_box(&nodes[1]),
                200.0,
                LetMode::Guarded,
                1e6,
            )
        })
    });

    group.bench_function("let_perturbed", |b| {
        b.iter(|| {
            link_expiration_time(
                black_box(&nodes[0]),
                black_box(&nodes[1]),
                200.0,
                LetMode::Perturbed,
                1e6,
            )
        })
    });

    group.bench_function("let_and_lap", |b| {
        b.iter(|| {
            let t = model.link_expiration(black_box(&nodes[0]), black_box(&nodes[1]));
            model.availability(t, 2.0)
        })
    });

    let crowd = make_highway(100, 20.0);
    group.bench_function("density_100_nodes", |b| {
        b.iter(|| model.density(black_box(50), black_box(&crowd)))
    });

    group.finish();
}

// ============================================================================
// Selector Benchmarks
// ============================================================================

fn bench_selectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector");
    let topsis = Topsis::new(vec![Rank::Benefit, Rank::Cost, Rank::Benefit]);

    let small = make_candidates(8, 3);
    group.bench_function("topsis_8_candidates", |b| {
        b.iter(|| topsis.select(black_box(&small)).map(|c| c.item))
    });

    let large = make_candidates(64, 3);
    group.bench_function("topsis_64_candidates", |b| {
        b.iter(|| topsis.select(black_box(&large)).map(|c| c.item))
    });

    let four = make_candidates(32, 4);
    group.bench_function("normalized_sum_32_candidates", |b| {
        b.iter(|| select_normalized_sum(black_box(&four)).map(|c| c.item))
    });

    group.finish();
}

// ============================================================================
// Path-Building Benchmarks
// ============================================================================

fn bench_path_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_building");
    let builder = PathBuilder {
        model: LinkModel::new(200.0),
        weights: ScoreWeights::default(),
        relay_cost: RouteCost::Scaled { scale: 1e6 },
        final_cost: RouteCost::Fixed(1_000_000),
    };
    let nodes = make_highway(60, 40.0);

    group.bench_function("candidates_60_nodes", |b| {
        b.iter(|| {
            builder
                .candidates(black_box(&nodes), NodeId(0), NodeId(59), |_| false)
                .len()
        })
    });

    group.finish();
}

// ============================================================================
// Config Benchmarks
// ============================================================================

fn bench_config(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");

    group.bench_function("validate_mine2_config", |b| {
        let config = StrategyConfig::mine2();
        b.iter(|| config.validate())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_link_model,
    bench_selectors,
    bench_path_scoring,
    bench_config,
);

criterion_main!(benches);
