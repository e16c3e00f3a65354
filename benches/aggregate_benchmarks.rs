use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kube_pvc_usage::parsing::parse_duration;
use kube_pvc_usage::{aggregate, PvcRef, VolumeRecord};

fn node_volumes(count: usize) -> Vec<VolumeRecord> {
    (0..count)
        .map(|i| VolumeRecord {
            name: format!("vol-{}", i),
            capacity_bytes: if i % 7 == 0 { 0.0 } else { 10_737_418_240.0 },
            used_bytes: (i * 1_048_576) as f64,
            available_bytes: 10_737_418_240.0 - (i * 1_048_576) as f64,
            // Roughly a third of pod volumes are projected tokens or emptyDirs
            pvc_ref: (i % 3 != 0).then(|| PvcRef {
                name: format!("pvc-{}", i),
                namespace: format!("ns-{}", i % 10),
            }),
            ..Default::default()
        })
        .collect()
}

fn aggregate_benchmark(c: &mut Criterion) {
    let volumes = node_volumes(5_000);

    c.bench_function("aggregate_5000_volumes", |b| {
        b.iter(|| black_box(aggregate(black_box(&volumes))))
    });
}

fn duration_parsing_benchmark(c: &mut Criterion) {
    let test_values = vec!["15s", "5m", "1h30m", "500ms", "1.5s", "30"];

    c.bench_function("parse_duration", |b| {
        b.iter(|| {
            for value in &test_values {
                black_box(parse_duration(black_box(value)));
            }
        })
    });
}

criterion_group!(benches, aggregate_benchmark, duration_parsing_benchmark);
criterion_main!(benches);
