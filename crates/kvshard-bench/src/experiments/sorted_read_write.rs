//! Writes and point reads in generation order (`a`) vs sorted by id (`b`).

use std::sync::Arc;

use kvshard_core::{find_by_ids, read_all, Environment, StoreRegistry};

use crate::config::BenchConfig;
use crate::error::Error;
use crate::experiments::{cleanup, insert_buckets, slot, stores_of, verify_count, Layout, Slot};
use crate::fixtures::{half, DocumentGenerator};
use crate::harness::TestCase;

/// Default number of documents.
pub const DOCUMENTS: usize = 1000;

/// Build one run of the experiment.
pub async fn test_case(
    env: Arc<Environment>,
    config: BenchConfig,
    seed: Option<u64>,
) -> Result<TestCase, Error> {
    let mut generator = DocumentGenerator::from_seed(seed).with_age_distribution(config.ages);
    let store_name = generator.names(1).remove(0);
    let db_names = generator.names(2);
    let documents = generator.documents(config.document_count(DOCUMENTS));

    let mut sorted_documents = documents.clone();
    sorted_documents.sort_by(|a, b| a.id.cmp(&b.id));
    let half_ids: Vec<String> = half(&documents).into_iter().map(|d| d.id).collect();
    let mut sorted_ids = half_ids.clone();
    sorted_ids.sort();

    let strategies: [(&str, String, Slot<Layout>); 2] = [
        ("a", db_names[0].clone(), slot()),
        ("b", db_names[1].clone(), slot()),
    ];
    let mut test_case = TestCase::new();

    for (label, db_name, state) in &strategies {
        let (env, db_name, state) = (env.clone(), db_name.clone(), state.clone());
        let store = store_name.clone();
        test_case.add("open", label, move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), [store.as_str()]);
            let db = env.open_database(&db_name, &registry).await?;
            *state.lock().await = Some(Layout::single_database(db, &[store])?);
            Ok(())
        });
    }

    for ((label, _, state), docs) in strategies.iter().zip([documents, sorted_documents]) {
        let state = state.clone();
        test_case.add("insert", label, move || async move {
            let stores = stores_of(&state, "insert").await?;
            insert_buckets(&stores, vec![docs]).await?;
            Ok(())
        });
    }

    let expected = config.document_count(DOCUMENTS);
    for (label, _, state) in &strategies {
        let (state, verify) = (state.clone(), config.verify);
        test_case.add("read", label, move || async move {
            let stores = stores_of(&state, "read").await?;
            let mut count = 0;
            for store in &stores {
                count += read_all(store).await?.len();
            }
            if verify {
                verify_count("read", count, expected)?;
            }
            Ok(())
        });
    }

    for ((label, _, state), ids) in strategies.iter().zip([half_ids, sorted_ids]) {
        let (state, verify) = (state.clone(), config.verify);
        test_case.add("read-by-id", label, move || async move {
            let stores = stores_of(&state, "read-by-id").await?;
            let mut found = 0;
            for store in &stores {
                found += find_by_ids(store, ids.clone())
                    .await?
                    .iter()
                    .filter(|d| d.is_some())
                    .count();
            }
            if verify {
                verify_count("read-by-id", found, ids.len())?;
            }
            Ok(())
        });
    }

    for (label, _, state) in &strategies {
        let (env, state) = (env.clone(), state.clone());
        test_case.add("cleanup", label, move || async move {
            cleanup(&env, &state, "cleanup").await
        });
    }

    Ok(test_case)
}
