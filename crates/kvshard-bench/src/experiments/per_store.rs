//! Many stores: one database holding all of them, one database per store,
//! or an empty database upgraded to add them.

use std::sync::Arc;

use futures::future::try_join_all;
use kvshard_core::{Environment, StoreDef, StoreRegistry};

use crate::config::BenchConfig;
use crate::error::Error;
use crate::experiments::{
    cleanup, insert_buckets, read_everything, slot, stores_of, verify_count, Layout, Slot,
};
use crate::fixtures::{half, DocumentGenerator};
use crate::harness::TestCase;

/// Number of stores.
pub const STORES: usize = 10;

/// Documents written to every store.
pub const DOCUMENTS_PER_STORE: usize = 1000;

/// Store name used when a database holds a single store.
const SINGLE_STORE: &str = "documents";

/// Build one run of the experiment.
pub async fn test_case(
    env: Arc<Environment>,
    config: BenchConfig,
    seed: Option<u64>,
) -> Result<TestCase, Error> {
    let mut generator = DocumentGenerator::from_seed(seed).with_age_distribution(config.ages);
    let store_names = generator.names(STORES);
    let db_names = generator.names(2);
    let documents = generator.documents(config.document_count(DOCUMENTS_PER_STORE));
    let half_ids: Vec<String> = half(&documents).into_iter().map(|d| d.id).collect();

    let layouts: [(&str, Slot<Layout>); 3] = [("a", slot()), ("b", slot()), ("c", slot())];
    let mut test_case = TestCase::new();

    // open
    {
        let (env, state, names) = (env.clone(), layouts[0].1.clone(), store_names.clone());
        let db_name = db_names[0].clone();
        test_case.add("open", "a", move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), names.clone());
            let db = env.open_database(&db_name, &registry).await?;
            *state.lock().await = Some(Layout::single_database(db, &names)?);
            Ok(())
        });
    }
    {
        let (env, state, names) = (env.clone(), layouts[1].1.clone(), store_names.clone());
        test_case.add("open", "b", move || async move {
            let opens = names.iter().map(|name| {
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
        let (env, state, names) = (env.clone(), layouts[2].1.clone(), store_names.clone());
        let db_name = db_names[1].clone();
        test_case.add("open", "c", move || async move {
            let db = env.open_database(&db_name, &StoreRegistry::new()).await?;
            let defs = names.iter().map(StoreDef::new).collect();
            let db = db.upgrade(defs).await?.into_result()?;
            *state.lock().await = Some(Layout::single_database(db, &names)?);
            Ok(())
        });
    }

    for (label, state) in &layouts {
        let (state, documents) = (state.clone(), documents.clone());
        test_case.add("insert", label, move || async move {
            let stores = stores_of(&state, "insert").await?;
            let buckets = vec![documents; stores.len()];
            insert_buckets(&stores, buckets).await?;
            Ok(())
        });
    }

    for (label, state) in &layouts {
        let (state, verify, expected) = (state.clone(), config.verify, documents.len());
        test_case.add("read", label, move || async move {
            let stores = stores_of(&state, "read").await?;
            let all = read_everything(&stores).await?;
            if verify {
                verify_count("read", all.len(), expected * stores.len())?;
            }
            Ok(())
        });
    }

    for (label, state) in &layouts {
        let (state, verify, ids) = (state.clone(), config.verify, half_ids.clone());
        test_case.add("read-by-id", label, move || async move {
            let stores = stores_of(&state, "read-by-id").await?;
            let reads = stores.iter().map(|store| store.get_many(ids.clone()));
            let found = try_join_all(reads).await?;
            if verify {
                let count = found.iter().flatten().filter(|d| d.is_some()).count();
                verify_count("read-by-id", count, ids.len() * stores.len())?;
            }
            Ok(())
        });
    }

    for (label, state) in &layouts {
        let (env, state) = (env.clone(), state.clone());
        test_case.add("cleanup", label, move || async move {
            cleanup(&env, &state, "cleanup").await
        });
    }

    Ok(test_case)
}
