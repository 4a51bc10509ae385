//! Performance benchmarks for school-map-lib
//!
//! Run with: cargo bench --package school-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::Point;
use school_map_lib::{
    MapSession, ModeSelection, PointRecord, ProximityThreshold, ScreenPos, SessionConfig,
    aggregate_screen_positions, find_nearby_pairs,
};

/// Schools scattered over São Paulo state, every tenth one duplicated a meter away
fn generate_points(count: usize) -> Vec<Point<f64>> {
    (0..count)
        .map(|i| {
            let t = (i / 10) as f64;
            let lat = -23.5 + (t * 0.37).sin() * 1.5;
            let lon = -47.0 + (t * 0.23).cos() * 2.5;
            if i % 10 == 9 {
                Point::new(lon + 0.00001, lat)
            } else {
                Point::new(lon + i as f64 * 1e-3, lat)
            }
        })
        .collect()
}

fn generate_records(count: usize) -> Vec<PointRecord> {
    generate_points(count)
        .into_iter()
        .enumerate()
        .map(|(i, p)| PointRecord::new(i as u64, p.y(), p.x(), format!("Escola {i}")))
        .collect()
}

/// Screen positions of a 1280x800 viewport with some dense spots
fn generate_screen_positions(count: usize) -> Vec<ScreenPos> {
    (0..count)
        .map(|i| {
            let t = i as f32;
            ScreenPos::new((t * 7.3) % 1280.0, (t * 3.1 + (t * 0.1).sin() * 40.0) % 800.0)
        })
        .collect()
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_proximity(c: &mut Criterion) {
    let mut group = c.benchmark_group("proximity");

    for count in [100, 500, 2_000] {
        let points = generate_points(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("find_nearby_pairs", count), &points, |b, points| {
            b.iter(|| find_nearby_pairs(points, ProximityThreshold::default()));
        });
    }

    group.finish();
}

fn bench_screen_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");

    for count in [100, 500, 2_000] {
        let positions = generate_screen_positions(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("aggregate_30px", count), &positions, |b, positions| {
            b.iter(|| aggregate_screen_positions(positions, 30.0));
        });
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    let records = generate_records(1_000);
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("session_1k_points", |b| {
        let mut session = MapSession::new(SessionConfig::default(), ModeSelection::Auto);
        b.iter(|| session.rebuild(records.clone(), Vec::new()));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_proximity, bench_screen_clustering, bench_rebuild);

criterion_main!(benches);
