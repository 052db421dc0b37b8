//! Shard routing benchmarks.

use std::num::NonZeroUsize;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvshard_bench::fixtures::random_string;
use kvshard_bench::DocumentGenerator;
use kvshard_core::{hash_string, shard_key, ShardRouter};

fn shards(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn bench_hash_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard/hash");

    for len in [12, 100, 1_000] {
        let mut generator = DocumentGenerator::new(len as u64);
        let s = random_string(generator.rng(), len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("hash_string", len), &s, |b, s| {
            b.iter(|| hash_string(black_box(s)));
        });
    }

    group.finish();
}

fn bench_shard_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard/key");
    let ids: Vec<String> = DocumentGenerator::new(1)
        .documents(1_000)
        .into_iter()
        .map(|d| d.id)
        .collect();

    for count in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("shard_key", count), &count, |b, &count| {
            let mut idx = 0;
            b.iter(|| {
                let id = &ids[idx % ids.len()];
                idx += 1;
                black_box(shard_key(shards(count), black_box(id)));
            });
        });
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard/partition");

    for size in [1_000, 10_000] {
        let documents = DocumentGenerator::new(2).documents(size);
        let router = ShardRouter::new(shards(10));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("documents", size), &documents, |b, docs| {
            b.iter(|| black_box(router.partition_documents(black_box(docs))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hash_string, bench_shard_key, bench_partition);
criterion_main!(benches);
