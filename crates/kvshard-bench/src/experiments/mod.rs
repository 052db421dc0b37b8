//! Layout experiments.
//!
//! Every experiment is a factory producing a [`TestCase`](crate::harness::TestCase).
//! State that later metrics need (open databases, store handles) lives in
//! shared slots filled by the `open` metric and emptied by `cleanup`.

pub mod dynamic_stores;
pub mod per_store;
pub mod sharding;
pub mod sorted_read_write;

use std::num::NonZeroUsize;
use std::sync::Arc;

use clap::ValueEnum;
use futures::future::try_join_all;
use kvshard_core::{
    compare_by_age_then_id, scan_partitions, Database, Document, Environment, ObjectStore,
    ShardRouter,
};
use tokio::sync::Mutex;

use crate::config::BenchConfig;
use crate::error::Error;
use crate::harness::{run_test_case, BenchmarkReport};

/// Selectable experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExperimentKind {
    /// Many stores: one database vs database per store vs upgrade.
    PerStore,
    /// Sharded layouts and read strategies.
    Sharding,
    /// Adding stores to an existing database.
    DynamicStores,
    /// Unsorted vs id-sorted writes and reads.
    SortedReadWrite,
}

impl ExperimentKind {
    /// Experiment name as used on the command line and in reports.
    pub fn name(&self) -> &'static str {
        match self {
            ExperimentKind::PerStore => "per-store",
            ExperimentKind::Sharding => "sharding",
            ExperimentKind::DynamicStores => "dynamic-stores",
            ExperimentKind::SortedReadWrite => "sorted-read-write",
        }
    }
}

/// Run an experiment against a fresh environment built from `config`.
pub async fn run_experiment(
    kind: ExperimentKind,
    config: &BenchConfig,
) -> Result<BenchmarkReport, Error> {
    let env = Arc::new(Environment::new(config.storage.clone()));
    // Each run draws its data from its own seed so runs differ but stay reproducible
    let mut run = 0u64;
    let mut next_seed = move || {
        run += 1;
        config.seed.map(|seed| seed.wrapping_add(run))
    };

    match kind {
        ExperimentKind::PerStore => {
            run_test_case(
                kind.name(),
                || per_store::test_case(env.clone(), config.clone(), next_seed()),
                config,
            )
            .await
        }
        ExperimentKind::Sharding => {
            run_test_case(
                kind.name(),
                || sharding::test_case(env.clone(), config.clone(), next_seed()),
                config,
            )
            .await
        }
        ExperimentKind::DynamicStores => {
            run_test_case(
                kind.name(),
                || dynamic_stores::test_case(env.clone(), config.clone(), next_seed()),
                config,
            )
            .await
        }
        ExperimentKind::SortedReadWrite => {
            run_test_case(
                kind.name(),
                || sorted_read_write::test_case(env.clone(), config.clone(), next_seed()),
                config,
            )
            .await
        }
    }
}

/// Shared state filled by one metric and used by later ones.
pub(crate) type Slot<T> = Arc<Mutex<Option<T>>>;

pub(crate) fn slot<T>() -> Slot<T> {
    Arc::new(Mutex::new(None))
}

/// Move the state out of a slot.
pub(crate) async fn take<T>(slot: &Slot<T>, what: &str) -> Result<T, Error> {
    slot.lock()
        .await
        .take()
        .ok_or_else(|| Error::MissingState(what.to_string()))
}

/// Databases opened by one strategy and the stores it reads and writes,
/// in shard order.
pub(crate) struct Layout {
    pub databases: Vec<Database>,
    pub stores: Vec<ObjectStore>,
}

impl Layout {
    /// One store per database, in database order.
    pub(crate) fn per_database(databases: Vec<Database>, store: &str) -> Result<Self, Error> {
        let stores = databases
            .iter()
            .map(|db| db.store(store))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { databases, stores })
    }

    /// Several stores in one database.
    pub(crate) fn single_database<S: AsRef<str>>(
        database: Database,
        stores: &[S],
    ) -> Result<Self, Error> {
        let stores = database.stores(stores)?;
        Ok(Self {
            databases: vec![database],
            stores,
        })
    }
}

/// Clone the stores of the layout in `slot` without taking it.
pub(crate) async fn stores_of(
    slot: &Slot<Layout>,
    what: &str,
) -> Result<Vec<ObjectStore>, Error> {
    slot.lock()
        .await
        .as_ref()
        .map(|layout| layout.stores.clone())
        .ok_or_else(|| Error::MissingState(what.to_string()))
}

/// Write `buckets[i]` into `stores[i]`, all stores concurrently.
pub(crate) async fn insert_buckets(
    stores: &[ObjectStore],
    buckets: Vec<Vec<Document>>,
) -> Result<usize, Error> {
    if stores.len() != buckets.len() {
        return Err(Error::Config(format!(
            "{} buckets for {} stores",
            buckets.len(),
            stores.len()
        )));
    }
    let written = try_join_all(
        stores
            .iter()
            .zip(buckets)
            .map(|(store, bucket)| store.put_many(bucket)),
    )
    .await?;
    Ok(written.into_iter().sum())
}

/// Point-read `ids` from the store each one routes to, with the stores
/// taken as shards in order. Stores with no ids are skipped. Returns the
/// number of documents found.
pub(crate) async fn find_routed(stores: &[ObjectStore], ids: &[String]) -> Result<usize, Error> {
    let shards = NonZeroUsize::new(stores.len())
        .ok_or_else(|| Error::MissingState("no stores to read from".to_string()))?;
    let buckets = ShardRouter::new(shards).partition_ids(ids);
    let found = try_join_all(
        stores
            .iter()
            .zip(buckets)
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(store, ids)| store.get_many(ids)),
    )
    .await?;
    Ok(found.into_iter().flatten().flatten().count())
}

/// Every document of every store, in store order.
pub(crate) async fn read_everything(stores: &[ObjectStore]) -> Result<Vec<Document>, Error> {
    Ok(scan_partitions(stores, |store| async move { store.get_all().await }).await?)
}

/// Check a read returned exactly `expected` once sorted by age then id.
pub(crate) fn verify_sorted(
    mut result: Vec<Document>,
    expected: &[Document],
) -> Result<(), Error> {
    if result.len() != expected.len() {
        return Err(Error::Verification(format!(
            "expected {} documents, got {}",
            expected.len(),
            result.len()
        )));
    }
    result.sort_by(compare_by_age_then_id);
    for (idx, (got, want)) in result.iter().zip(expected).enumerate() {
        if got.id != want.id {
            return Err(Error::Verification(format!(
                "document {} is {}, expected {}",
                idx, got.id, want.id
            )));
        }
    }
    Ok(())
}

/// Delete every database of the layout in `slot`.
pub(crate) async fn cleanup(
    env: &Environment,
    slot: &Slot<Layout>,
    what: &str,
) -> Result<(), Error> {
    let Layout { databases, stores } = take(slot, what).await?;
    drop(stores);
    env.delete_databases(databases).await?;
    Ok(())
}

/// Check a count.
pub(crate) fn verify_count(what: &str, got: usize, expected: usize) -> Result<(), Error> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::Verification(format!(
            "{}: expected {}, got {}",
            what, expected, got
        )))
    }
}
