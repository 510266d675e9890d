use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use watchtree_core::{utils, EnabledManager, Manager, Pattern};

fn populated(groups: usize, per_group: usize) -> EnabledManager {
    let manager = EnabledManager::new();
    for g in 0..groups {
        for m in 0..per_group {
            let stopwatch = manager.stopwatch(&format!("app.group{}.op{}", g, m)).unwrap();
            stopwatch.add_time((g * 1000 + m) as u64 * 1_000);
            let counter = manager.counter(&format!("app.group{}.count{}", g, m)).unwrap();
            counter.increase_by((g + m) as i64);
        }
    }
    manager
}

/// Benchmark sampling a single stopwatch
fn bench_sample_stopwatch(c: &mut Criterion) {
    let manager = EnabledManager::new();
    let stopwatch = manager.stopwatch("bench.stopwatch").unwrap();
    for i in 0..100 {
        stopwatch.add_time(i * 1_000);
    }

    c.bench_function("sample_stopwatch", |b| {
        b.iter(|| {
            black_box(stopwatch.sample_stopwatch());
        });
    });
}

/// Benchmark incremental sampling against a busy counter
fn bench_sample_increment(c: &mut Criterion) {
    let manager = EnabledManager::new();
    let counter = manager.counter("bench.counter").unwrap();

    c.bench_function("sample_increment", |b| {
        b.iter(|| {
            counter.increase_by(5);
            black_box(counter.sample_increment(black_box("reader")));
        });
    });
}

/// Benchmark subtree aggregation with varying tree sizes
fn bench_aggregate_subtree(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_stopwatches");

    for (name, groups, per_group) in [("small", 2, 5), ("medium", 10, 20), ("large", 20, 50)] {
        let manager = populated(groups, per_group);
        let root = manager.root_monitor();

        group.bench_with_input(BenchmarkId::from_parameter(name), &root, |b, root| {
            b.iter(|| {
                black_box(utils::aggregate_stopwatches(root.as_monitor(), None));
            });
        });
    }
    group.finish();
}

/// Benchmark pattern-filtered monitor listing
fn bench_monitors_matching(c: &mut Criterion) {
    let manager = populated(10, 20);
    let pattern = Pattern::new("app.group3.*").unwrap();

    c.bench_function("monitors_matching", |b| {
        b.iter(|| {
            black_box(manager.monitors_matching(black_box(&pattern)));
        });
    });
}

/// Benchmark rendering the tree as text
fn bench_tree_string(c: &mut Criterion) {
    let manager = populated(10, 20);
    let root = manager.root_monitor();

    c.bench_function("tree_string", |b| {
        b.iter(|| {
            black_box(utils::tree_string(root.as_monitor()));
        });
    });
}

criterion_group!(
    benches,
    bench_sample_stopwatch,
    bench_sample_increment,
    bench_aggregate_subtree,
    bench_monitors_matching,
    bench_tree_string
);
criterion_main!(benches);
