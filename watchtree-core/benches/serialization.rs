use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use watchtree_core::{ConfigDocument, EnabledManager, Manager, Sample};

/// Benchmark JSON serialization of tree samples with varying sizes
fn bench_json_serialization_varying_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_serialization");

    let configs = vec![
        ("small", 1, 5),
        ("medium", 5, 20),
        ("large", 10, 50),
    ];

    for (name, group_count, monitor_count) in configs {
        let manager = EnabledManager::new();
        for g in 0..group_count {
            for m in 0..monitor_count {
                let stopwatch = manager.stopwatch(&format!("svc{}.op{}", g, m)).unwrap();
                stopwatch.add_time((g * 1000 + m * 10) as u64);
            }
        }
        let samples: Vec<Sample> = manager
            .monitors(&|_| true)
            .iter()
            .map(|monitor| monitor.sample())
            .collect();

        let json = serde_json::to_string(&samples).unwrap();
        group.throughput(Throughput::Bytes(json.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(name), &samples, |b, samples| {
            b.iter(|| {
                black_box(serde_json::to_string(black_box(samples)).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark parsing a configuration document
fn bench_config_document_parse(c: &mut Criterion) {
    let json = r#"{
        "monitors": [
            { "pattern": "*", "state": "disabled" },
            { "pattern": "stopwatch:db.*", "state": "enabled" }
        ],
        "callbacks": [
            {
                "kind": "filter",
                "rules": [{ "type": "must", "condition": "split > 50ms", "events": ["stop"] }],
                "callbacks": [{ "kind": "logging", "properties": { "level": "warn" } }]
            }
        ]
    }"#;

    c.bench_function("config_document_parse", |b| {
        b.iter(|| {
            black_box(ConfigDocument::from_json(black_box(json)).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_json_serialization_varying_sizes,
    bench_config_document_parse
);
criterion_main!(benches);
