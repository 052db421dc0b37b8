//! Read strategy benchmarks against a populated store.

use std::num::NonZeroUsize;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kvshard_bench::DocumentGenerator;
use kvshard_core::storage::AGE_INDEX;
use kvshard_core::{
    batched_custom_index_scan, batched_range_scan, find_via_cursor, find_via_get_all, read_all,
    Environment, KeyPart, ObjectStore, StoreRegistry,
};
use tokio::runtime::Runtime;

const MAX_AGE: f64 = 25.0;

fn populated_store(rt: &Runtime, documents: usize) -> (Environment, ObjectStore) {
    rt.block_on(async {
        let env = Environment::temporary();
        let registry = StoreRegistry::new().with_stores("bench", ["documents"]);
        let db = env.open_database("bench", &registry).await.unwrap();
        let store = db.store("documents").unwrap();
        store
            .put_many(DocumentGenerator::new(7).documents(documents))
            .await
            .unwrap();
        (env, store)
    })
}

fn bench_range_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("scan/range");
    group.sample_size(20);

    for size in [1_000, 10_000] {
        let (_env, store) = populated_store(&rt, size);

        group.bench_with_input(BenchmarkId::new("cursor", size), &store, |b, store| {
            b.to_async(&rt)
                .iter(|| async { black_box(find_via_cursor(store, MAX_AGE).await.unwrap()) });
        });

        group.bench_with_input(BenchmarkId::new("get_all", size), &store, |b, store| {
            b.to_async(&rt)
                .iter(|| async { black_box(find_via_get_all(store, MAX_AGE).await.unwrap()) });
        });

        for page in [10, 50, 10_000] {
            let page_size = NonZeroUsize::new(page).unwrap();
            let name = format!("batched_{}", page);
            group.bench_with_input(BenchmarkId::new(name, size), &store, |b, store| {
                b.to_async(&rt).iter(|| async {
                    let max = KeyPart::Number(MAX_AGE);
                    black_box(batched_range_scan(store, AGE_INDEX, page_size, max).await.unwrap())
                });
            });
        }

        group.bench_with_input(BenchmarkId::new("custom_index", size), &store, |b, store| {
            let page_size = NonZeroUsize::new(10).unwrap();
            b.to_async(&rt).iter(|| async {
                black_box(
                    batched_custom_index_scan(store, page_size, MAX_AGE)
                        .await
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_full_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("scan/full");
    group.sample_size(20);

    for size in [1_000, 10_000] {
        let (_env, store) = populated_store(&rt, size);
        group.bench_with_input(BenchmarkId::new("read_all", size), &store, |b, store| {
            b.to_async(&rt)
                .iter(|| async { black_box(read_all(store).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_range_reads, bench_full_read);
criterion_main!(benches);
