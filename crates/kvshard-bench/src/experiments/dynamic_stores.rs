//! Adding stores to an existing database, either by reopening it with more
//! required stores (`a`) or by an explicit upgrade (`b`). Both must keep the
//! document written before the change.

use std::sync::Arc;

use kvshard_core::{Database, Document, Environment, StoreDef, StoreRegistry};

use crate::config::BenchConfig;
use crate::error::Error;
use crate::experiments::{slot, take, Slot};
use crate::fixtures::DocumentGenerator;
use crate::harness::TestCase;

/// Stores added to the database.
pub const STORES: usize = 10;

/// Store holding the document written before the change.
const MAIN_STORE: &str = "documents";

/// Build one run of the experiment.
pub async fn test_case(
    env: Arc<Environment>,
    config: BenchConfig,
    seed: Option<u64>,
) -> Result<TestCase, Error> {
    let mut generator = DocumentGenerator::from_seed(seed).with_age_distribution(config.ages);
    let store_names = generator.names(STORES);
    let db_names = generator.names(2);
    let document = generator.document();

    let strategies: [(&str, String, Slot<Database>); 2] = [
        ("a", db_names[0].clone(), slot()),
        ("b", db_names[1].clone(), slot()),
    ];
    let mut test_case = TestCase::new();

    for (label, db_name, _) in &strategies {
        let (env, db_name, document) = (env.clone(), db_name.clone(), document.clone());
        test_case.add("open-insert-close", label, move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), [MAIN_STORE]);
            let db = env.open_database(&db_name, &registry).await?;
            db.store(MAIN_STORE)?.put_many(vec![document]).await?;
            db.close();
            Ok(())
        });
    }

    {
        let (_, db_name, state) = &strategies[0];
        let (env, db_name, state) = (env.clone(), db_name.clone(), state.clone());
        let (names, id) = (store_names.clone(), document.id.clone());
        test_case.add("open-with-more-stores", "a", move || async move {
            let mut required: Vec<String> = names;
            required.push(MAIN_STORE.to_string());
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), required);
            let db = env.open_database(&db_name, &registry).await?;
            ensure_document(&db, &id).await?;
            *state.lock().await = Some(db);
            Ok(())
        });
    }
    {
        let (_, db_name, state) = &strategies[1];
        let (env, db_name, state) = (env.clone(), db_name.clone(), state.clone());
        let (names, id) = (store_names.clone(), document.id.clone());
        test_case.add("open-with-more-stores", "b", move || async move {
            let registry = StoreRegistry::new().with_stores(db_name.as_str(), [MAIN_STORE]);
            let db = env.open_database(&db_name, &registry).await?;
            let defs = names.iter().map(StoreDef::new).collect();
            let db = db.upgrade(defs).await?.into_result()?;
            ensure_document(&db, &id).await?;
            *state.lock().await = Some(db);
            Ok(())
        });
    }

    for (label, _, state) in &strategies {
        let (env, state) = (env.clone(), state.clone());
        test_case.add("cleanup", label, move || async move {
            let db = take(&state, "cleanup").await?;
            env.delete_database(db).await?;
            Ok(())
        });
    }

    Ok(test_case)
}

async fn ensure_document(db: &Database, id: &str) -> Result<Document, Error> {
    db.store(MAIN_STORE)?
        .get(id)
        .await?
        .ok_or_else(|| Error::Verification(format!("document {} lost in {}", id, db.name())))
}
