//! Benchmarks for the hot paths: value routing and whole jobs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::io::Write;
use std::time::Duration;
use xsect::{codec, BlobStore, Engine, EngineConfig, LocalStore, Partitioner};

fn generate(count: usize, span: i32, seed: u64) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.random_range(-span..span)).collect()
}

fn write_input(store: &LocalStore, path: &str, values: &[i32]) {
    let mut sink = store.create(path).unwrap();
    for &value in values {
        sink.write_all(&codec::encode(value)).unwrap();
    }
    sink.flush().unwrap();
}

/// Routing cost per value across fan-out sizes.
fn bench_partition_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_of");
    let values = generate(1_000_000, i32::MAX, 1);
    group.throughput(Throughput::Elements(values.len() as u64));

    for &partitions in &[64u32, 256, 1024] {
        let partitioner = Partitioner::new(partitions, 0);
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &partitioner,
            |b, partitioner| {
                b.iter(|| {
                    let mut acc = 0u64;
                    for &value in &values {
                        acc = acc.wrapping_add(u64::from(partitioner.partition_of(value)));
                    }
                    black_box(acc)
                });
            },
        );
    }
    group.finish();
}

/// Whole jobs, scatter through materialize, on the local store.
fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("intersect");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));

    for &records in &[100_000usize, 400_000] {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        write_input(&store, "a.bin", &generate(records, records as i32 / 2, 7));
        write_input(&store, "b.bin", &generate(records, records as i32 / 2, 8));

        let config = EngineConfig {
            partition_count: 16,
            ..EngineConfig::default()
        };
        let engine = Engine::with_store(config, store.clone()).unwrap();

        group.throughput(Throughput::Elements(2 * records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(records),
            &records,
            |b, _| {
                let mut run = 0u64;
                b.iter(|| {
                    run += 1;
                    let output = format!("out-{run}.bin");
                    let report = engine.intersect("a.bin", "b.bin", &output).unwrap();
                    black_box(report.records)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_partition_routing, bench_end_to_end);
criterion_main!(benches);
