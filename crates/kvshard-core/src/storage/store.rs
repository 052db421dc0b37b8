//! Object stores and their secondary indexes.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::{Db, IVec, Transactional, Tree};
use tracing::debug;

use super::cursor::IndexCursor;
use super::index::{IndexDef, StoreDef};
use super::key::{entry_key, EntryRange, KeyPart, KeyRange};
use crate::document::Document;
use crate::error::Error;

/// Tree name prefix for store data.
const STORE_TREE_PREFIX: &str = "store:";

/// Tree name prefix for index entries.
const INDEX_TREE_PREFIX: &str = "index:";

/// A keyed collection of documents with engine-maintained indexes.
///
/// Data tree: `id -> document bytes`.
/// Index trees: `encoded_key ++ separator ++ encoded_id -> id`.
///
/// Handles are cheap to clone and share the underlying trees.
#[derive(Clone)]
pub struct ObjectStore {
    def: Arc<StoreDef>,
    data: Tree,
    indexes: Arc<Vec<Index>>,
    durable: bool,
}

/// A document prepared for writing outside the transaction closure.
struct PreparedRow {
    primary_key: String,
    value: Vec<u8>,
    entries: Vec<Vec<u8>>,
}

impl ObjectStore {
    /// Open or create the trees backing a store definition.
    pub(crate) fn open(db: &Db, def: StoreDef, durable: bool) -> Result<Self, Error> {
        let data = db.open_tree(format!("{}{}", STORE_TREE_PREFIX, def.name))?;
        let def = Arc::new(def);

        let mut indexes = Vec::with_capacity(def.indexes.len());
        for index_def in &def.indexes {
            let tree = db.open_tree(format!(
                "{}{}:{}",
                INDEX_TREE_PREFIX, def.name, index_def.name
            ))?;
            indexes.push(Index {
                store: def.name.clone(),
                def: Arc::new(index_def.clone()),
                tree,
                data: data.clone(),
            });
        }

        Ok(Self {
            def,
            data,
            indexes: Arc::new(indexes),
            durable,
        })
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Store definition.
    pub fn definition(&self) -> &StoreDef {
        &self.def
    }

    /// Look up an index by name.
    pub fn index(&self, name: &str) -> Result<Index, Error> {
        self.indexes
            .iter()
            .find(|i| i.def.name == name)
            .cloned()
            .ok_or_else(|| Error::UnknownIndex {
                store: self.def.name.clone(),
                index: name.to_string(),
            })
    }

    /// Names of the store's indexes.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.def.name.clone()).collect()
    }

    /// Write a batch of documents in one transaction.
    ///
    /// Existing documents with the same id are replaced together with their
    /// index entries. Completes once the transaction commits, and after a
    /// disk flush when durable commits are enabled.
    pub async fn put_many(&self, documents: Vec<Document>) -> Result<usize, Error> {
        let count = documents.len();
        if count == 0 {
            return Ok(0);
        }

        let store = self.clone();
        tokio::task::spawn_blocking(move || store.put_many_blocking(&documents)).await??;

        if self.durable {
            self.data.flush_async().await?;
        }

        debug!(store = %self.def.name, count, "write batch committed");
        Ok(count)
    }

    fn prepare_row(&self, doc: &Document) -> Result<PreparedRow, Error> {
        let primary_key = self.primary_key(doc);
        let entries = self
            .indexes
            .iter()
            .map(|index| entry_key(&index.def.key_for(doc), &primary_key))
            .collect();

        Ok(PreparedRow {
            value: doc.to_bytes()?,
            primary_key,
            entries,
        })
    }

    fn primary_key(&self, doc: &Document) -> String {
        match self.def.key_path.extract(doc) {
            KeyPart::String(s) => s,
            KeyPart::Number(n) => n.to_string(),
            KeyPart::Bool(b) => b.to_string(),
            KeyPart::Min | KeyPart::Max => String::new(),
        }
    }

    fn put_many_blocking(&self, documents: &[Document]) -> Result<(), Error> {
        let rows = documents
            .iter()
            .map(|doc| self.prepare_row(doc))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut trees = Vec::with_capacity(1 + self.indexes.len());
        trees.push(self.data.clone());
        trees.extend(self.indexes.iter().map(|i| i.tree.clone()));

        trees.as_slice().transaction(|views| {
            let data = &views[0];
            for row in &rows {
                let previous = data.insert(row.primary_key.as_bytes(), row.value.as_slice())?;

                // Drop entries of the replaced version before adding new ones
                if let Some(previous) = previous {
                    let previous = Document::from_bytes(&previous)
                        .map_err(ConflictableTransactionError::Abort)?;
                    for (slot, index) in self.indexes.iter().enumerate() {
                        let stale = entry_key(&index.def.key_for(&previous), &row.primary_key);
                        views[slot + 1].remove(stale)?;
                    }
                }

                for (slot, entry) in row.entries.iter().enumerate() {
                    views[slot + 1].insert(entry.as_slice(), row.primary_key.as_bytes())?;
                }
            }
            Ok(())
        })?;

        Ok(())
    }

    /// Point read by primary key.
    pub async fn get(&self, id: &str) -> Result<Option<Document>, Error> {
        let data = self.data.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || read_document(&data, id.as_bytes())).await?
    }

    /// Point reads for many ids, one result slot per id in input order.
    ///
    /// All ids are read inside one transaction, so a concurrent write batch
    /// is seen either entirely or not at all.
    pub async fn get_many(&self, ids: Vec<String>) -> Result<Vec<Option<Document>>, Error> {
        let data = self.data.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Option<Document>>, Error> {
            let values = data.transaction(
                |tx| -> ConflictableTransactionResult<Vec<Option<IVec>>, Error> {
                    let mut values = Vec::with_capacity(ids.len());
                    for id in &ids {
                        values.push(tx.get(id.as_bytes())?);
                    }
                    Ok(values)
                },
            )?;
            values
                .into_iter()
                .map(|value| value.map(|bytes| Document::from_bytes(&bytes)).transpose())
                .collect()
        })
        .await?
    }

    /// Every document in primary key order.
    pub async fn get_all(&self) -> Result<Vec<Document>, Error> {
        let data = self.data.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Document>, Error> {
            data.iter()
                .values()
                .map(|value| Document::from_bytes(&value?))
                .collect()
        })
        .await?
    }

    /// Number of documents in the store.
    pub async fn count(&self) -> Result<usize, Error> {
        let data = self.data.clone();
        Ok(tokio::task::spawn_blocking(move || data.len()).await?)
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStore")
            .field("name", &self.def.name)
            .field("indexes", &self.index_names())
            .field("durable", &self.durable)
            .finish()
    }
}

fn read_document(data: &Tree, key: &[u8]) -> Result<Option<Document>, Error> {
    match data.get(key)? {
        Some(bytes) => Ok(Some(Document::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

/// A secondary index on an object store.
#[derive(Clone)]
pub struct Index {
    store: String,
    def: Arc<IndexDef>,
    tree: Tree,
    data: Tree,
}

impl Index {
    /// Index name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Index definition.
    pub fn definition(&self) -> &IndexDef {
        &self.def
    }

    /// Documents whose index key falls in `range`, in key order, at most
    /// `limit` of them.
    pub async fn get_all(
        &self,
        range: &KeyRange,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<Document>, Error> {
        let Some(entries) = range.to_entry_range() else {
            return Ok(Vec::new());
        };
        let index = self.clone();
        tokio::task::spawn_blocking(move || index.collect_blocking(entries, limit)).await?
    }

    /// Number of entries in `range`.
    pub async fn count(&self, range: &KeyRange) -> Result<usize, Error> {
        let Some(entries) = range.to_entry_range() else {
            return Ok(0);
        };
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, Error> {
            let mut count = 0;
            for item in tree.range(entries) {
                item?;
                count += 1;
            }
            Ok(count)
        })
        .await?
    }

    /// Open a cursor that fetches one entry per step.
    pub fn open_cursor(&self, range: &KeyRange) -> IndexCursor {
        IndexCursor::new(self.clone(), range.to_entry_range())
    }

    fn collect_blocking(
        &self,
        entries: EntryRange,
        limit: Option<NonZeroUsize>,
    ) -> Result<Vec<Document>, Error> {
        let limit = limit.map_or(usize::MAX, NonZeroUsize::get);
        let mut documents = Vec::new();
        for item in self.tree.range(entries).take(limit) {
            let (_, primary_key) = item?;
            documents.push(self.load(&primary_key)?);
        }
        Ok(documents)
    }

    /// First entry in `entries` with its document.
    pub(crate) fn first_in(
        &self,
        entries: EntryRange,
    ) -> Result<Option<(Vec<u8>, Document)>, Error> {
        match self.tree.range(entries).next() {
            Some(item) => {
                let (entry, primary_key) = item?;
                Ok(Some((entry.to_vec(), self.load(&primary_key)?)))
            }
            None => Ok(None),
        }
    }

    fn load(&self, primary_key: &[u8]) -> Result<Document, Error> {
        read_document(&self.data, primary_key)?.ok_or_else(|| {
            Error::InvalidData(format!(
                "index {} on store {} points at a missing document",
                self.def.name, self.store
            ))
        })
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("store", &self.store)
            .field("def", &self.def)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{stringify_age, Nested, NestedOb, NestedTed};
    use crate::storage::{Environment, StoreRegistry, AGE_INDEX, CUSTOM_AGE_INDEX};

    fn doc(id: &str, age: f64) -> Document {
        Document {
            id: id.to_string(),
            age,
            age_stringified: stringify_age(age, id),
            nr: 947.8226835334873,
            timestamp: 0,
            flag: false,
            long_string: String::new(),
            nested: Nested {
                ted: NestedTed {
                    ob: NestedOb {
                        ject: String::new(),
                    },
                },
            },
            pairs: Vec::new(),
        }
    }

    async fn open_store(env: &Environment) -> ObjectStore {
        let registry = StoreRegistry::new().with_stores("store", ["docs"]);
        let db = env.open_database("store", &registry).await.unwrap();
        db.store("docs").unwrap()
    }

    #[tokio::test]
    async fn test_replacing_fractional_age_leaves_no_stale_entries() {
        let env = Environment::temporary();
        let store = open_store(&env).await;

        store.put_many(vec![doc("x", 947.8226835334873)]).await.unwrap();
        store.put_many(vec![doc("x", 5.0)]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        for name in [AGE_INDEX, CUSTOM_AGE_INDEX] {
            let index = store.index(name).unwrap();
            assert_eq!(index.count(&KeyRange::all()).await.unwrap(), 1, "{}", name);
        }

        let by_age = store
            .index(AGE_INDEX)
            .unwrap()
            .get_all(&KeyRange::all(), None)
            .await
            .unwrap();
        assert_eq!(by_age, vec![doc("x", 5.0)]);
    }

    #[tokio::test]
    async fn test_replacing_within_one_batch_keeps_last_version() {
        let env = Environment::temporary();
        let store = open_store(&env).await;

        store
            .put_many(vec![doc("x", 10.5), doc("x", 20.25), doc("y", 1.0)])
            .await
            .unwrap();

        assert_eq!(store.get("x").await.unwrap(), Some(doc("x", 20.25)));
        let index = store.index(AGE_INDEX).unwrap();
        assert_eq!(index.count(&KeyRange::all()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_many_keeps_input_order() {
        let env = Environment::temporary();
        let store = open_store(&env).await;
        store
            .put_many(vec![doc("a", 1.0), doc("b", 2.0)])
            .await
            .unwrap();

        let ids = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let found = store.get_many(ids).await.unwrap();
        assert_eq!(found, vec![Some(doc("b", 2.0)), None, Some(doc("a", 1.0))]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_get_many_sees_whole_write_batches() {
        let env = Environment::temporary();
        let store = open_store(&env).await;
        let version = |id: &str, n: f64| Document { nr: n, ..doc(id, 1.0) };
        store
            .put_many(vec![version("a", 0.0), version("b", 0.0)])
            .await
            .unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for n in 1..=200 {
                    let n = f64::from(n);
                    store
                        .put_many(vec![version("a", n), version("b", n)])
                        .await
                        .unwrap();
                }
            })
        };

        for _ in 0..200 {
            let found = store
                .get_many(vec!["a".to_string(), "b".to_string()])
                .await
                .unwrap();
            let nrs: Vec<f64> = found.into_iter().map(|d| d.unwrap().nr).collect();
            assert_eq!(nrs[0], nrs[1]);
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let env = Environment::temporary();
        let store = open_store(&env).await;
        assert!(matches!(
            store.index("nope"),
            Err(Error::UnknownIndex { .. })
        ));
    }
}
