//! Sharded layouts and range-read strategies.
//!
//! Strategies:
//! - `a`: one database, one store
//! - `b`: one database, one store per shard
//! - `c`: one database per shard
//! - `d`: empty database upgraded with one store per shard
//! - `e`: one database opened once per shard store

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::try_join_all;
use kvshard_core::storage::AGE_INDEX;
use kvshard_core::{
    batched_custom_index_scan, batched_range_scan, compare_by_age_then_id, find_via_cursor,
    find_via_get_all, scan_partitions, Document, Environment, KeyPart, ObjectStore, ShardRouter,
    StoreDef, StoreRegistry,
};

use crate::config::BenchConfig;
use crate::error::Error;
use crate::experiments::{
    cleanup, find_routed, insert_buckets, read_everything, slot, stores_of, verify_count,
    verify_sorted, Layout, Slot,
};
use crate::fixtures::{half, DocumentGenerator};
use crate::harness::TestCase;

/// Number of shards.
pub const SHARDS: NonZeroUsize = non_zero(10);

/// Default number of documents.
pub const DOCUMENTS: usize = 40_000;

/// Range reads select `age <= QUARTER_MAX_AGE`, about a quarter of the data.
pub const QUARTER_MAX_AGE: f64 = 25.0;

/// Page sizes of the batched cursor metrics.
pub const BATCH_SIZES: [NonZeroUsize; 3] = [non_zero(10), non_zero(50), non_zero(10_000)];

/// Page size of the custom index metric.
const CUSTOM_INDEX_BATCH_SIZE: NonZeroUsize = non_zero(10);

/// Store name used when a database holds a single store.
const SINGLE_STORE: &str = "documents";

const STRATEGIES: [&str; 5] = ["a", "b", "c", "d", "e"];

/// Build one run of the experiment.
pub async fn test_case(
    env: Arc<Environment>,
    config: BenchConfig,
    seed: Option<u64>,
) -> Result<TestCase, Error> {
    let mut generator = DocumentGenerator::from_seed(seed).with_age_distribution(config.ages);
    let documents = generator.documents(config.document_count(DOCUMENTS));
    let store_names = generator.names(SHARDS.get());
    let db_names = generator.names(4 + SHARDS.get());

    let mut quarter: Vec<Document> = documents
        .iter()
        .filter(|d| d.age <= QUARTER_MAX_AGE)
        .cloned()
        .collect();
    quarter.sort_by(compare_by_age_then_id);
    let quarter = Arc::new(quarter);
    let quarter_ids: Vec<String> = half(&half(&documents)).into_iter().map(|d| d.id).collect();

    let router = ShardRouter::new(SHARDS);
    let sharded = router.partition_documents(&documents);

    let slots: [Slot<Layout>; 5] = std::array::from_fn(|_| slot());
    let layouts: Vec<(&'static str, Slot<Layout>)> =
        STRATEGIES.into_iter().zip(slots.iter().cloned()).collect();
    let mut test_case = TestCase::new();

    // open
    {
        let (env, state) = (env.clone(), slots[0].clone());
        let db_name = db_names[0].clone();
        test_case.add("open", "a", move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), [SINGLE_STORE]);
            let db = env.open_database(&db_name, &registry).await?;
            *state.lock().await = Some(Layout::single_database(db, &[SINGLE_STORE])?);
            Ok(())
        });
    }
    {
        let (env, state, names) = (env.clone(), slots[1].clone(), store_names.clone());
        let db_name = db_names[1].clone();
        test_case.add("open", "b", move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), names.clone());
            let db = env.open_database(&db_name, &registry).await?;
            *state.lock().await = Some(Layout::single_database(db, &names)?);
            Ok(())
        });
    }
    {
        let (env, state) = (env.clone(), slots[2].clone());
        let shard_dbs = db_names[4..].to_vec();
        test_case.add("open", "c", move || async move {
            let opens = shard_dbs.iter().map(|name| {
                let registry = StoreRegistry::new().with_stores(name.as_str(), [SINGLE_STORE]);
                let env = env.clone();
                async move { env.open_database(name, &registry).await }
            });
            let databases = try_join_all(opens).await?;
            *state.lock().await = Some(Layout::per_database(databases, SINGLE_STORE)?);
            Ok(())
        });
    }
    {
        let (env, state, names) = (env.clone(), slots[3].clone(), store_names.clone());
        let db_name = db_names[2].clone();
        test_case.add("open", "d", move || async move {
            let db = env.open_database(&db_name, &StoreRegistry::new()).await?;
            let defs = names.iter().map(StoreDef::new).collect();
            let db = db.upgrade(defs).await?.into_result()?;
            *state.lock().await = Some(Layout::single_database(db, &names)?);
            Ok(())
        });
    }
    {
        let (env, state, names) = (env.clone(), slots[4].clone(), store_names.clone());
        let db_name = db_names[3].clone();
        test_case.add("open", "e", move || async move {
            let opens = names.iter().map(|store| {
                let registry =
                    StoreRegistry::new().with_stores(db_name.as_str(), [store.as_str()]);
                let (env, db_name) = (env.clone(), db_name.clone());
                async move { env.open_database(&db_name, &registry).await }
            });
            let databases = try_join_all(opens).await?;
            let stores = databases
                .iter()
                .zip(&names)
                .map(|(db, store)| db.store(store))
                .collect::<Result<Vec<_>, _>>()?;
            *state.lock().await = Some(Layout { databases, stores });
            Ok(())
        });
    }

    for (label, state) in layouts.iter().cloned() {
        let buckets = if label == "a" {
            vec![documents.clone()]
        } else {
            sharded.clone()
        };
        test_case.add("insert", label, move || async move {
            let stores = stores_of(&state, "insert").await?;
            insert_buckets(&stores, buckets).await?;
            Ok(())
        });
    }

    for (label, state) in layouts.iter().cloned() {
        let (verify, expected) = (config.verify, documents.len());
        test_case.add("read", label, move || async move {
            let stores = stores_of(&state, "read").await?;
            let all = read_everything(&stores).await?;
            if verify {
                verify_count("read", all.len(), expected)?;
            }
            Ok(())
        });
    }

    for (label, state) in layouts.iter().cloned() {
        let (verify, ids) = (config.verify, quarter_ids.clone());
        test_case.add("read-by-id", label, move || async move {
            let stores = stores_of(&state, "read-by-id").await?;
            let found = find_routed(&stores, &ids).await?;
            if verify {
                verify_count("read-by-id", found, ids.len())?;
            }
            Ok(())
        });
    }

    let range_read = RangeRead {
        layouts: &layouts,
        expected: quarter,
        verify: config.verify,
    };

    range_read.add(&mut test_case, "read-by-cursor", |store| async move {
        find_via_cursor(&store, QUARTER_MAX_AGE).await
    });

    for page in BATCH_SIZES {
        let metric = format!("read-by-batched-cursor-{}", page);
        range_read.add(&mut test_case, &metric, move |store| async move {
            batched_range_scan(&store, AGE_INDEX, page, KeyPart::Number(QUARTER_MAX_AGE)).await
        });
    }

    let page = CUSTOM_INDEX_BATCH_SIZE;
    range_read.add(
        &mut test_case,
        "read-by-batched-cursor-custom-index",
        move |store| async move { batched_custom_index_scan(&store, page, QUARTER_MAX_AGE).await },
    );

    range_read.add(&mut test_case, "read-by-get-all", |store| async move {
        find_via_get_all(&store, QUARTER_MAX_AGE).await
    });

    for (label, state) in layouts.iter().cloned() {
        let env = env.clone();
        test_case.add("cleanup", label, move || async move {
            cleanup(&env, &state, "cleanup").await
        });
    }

    Ok(test_case)
}

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("constant must be non-zero"),
    }
}

/// Adds one range-read metric for every layout, fanning the read out over
/// the layout's stores and checking the merged result.
struct RangeRead<'a> {
    layouts: &'a [(&'static str, Slot<Layout>)],
    expected: Arc<Vec<Document>>,
    verify: bool,
}

impl RangeRead<'_> {
    fn add<F, Fut>(&self, test_case: &mut TestCase, metric: &str, read: F)
    where
        F: Fn(ObjectStore) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Document>, kvshard_core::Error>> + Send + 'static,
    {
        for (label, state) in self.layouts {
            let (state, expected, verify) = (state.clone(), self.expected.clone(), self.verify);
            let read = read.clone();
            let metric_name = metric.to_string();
            test_case.add(metric, label, move || async move {
                let stores = stores_of(&state, &metric_name).await?;
                let result = scan_partitions(&stores, read).await?;
                if verify {
                    verify_sorted(result, &expected)?;
                }
                Ok(())
            });
        }
    }
}
