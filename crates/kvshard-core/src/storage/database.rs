//! Database handles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sled::{Db, Tree};
use tracing::{info, warn};

use super::config::StorageConfig;
use super::index::StoreDef;
use super::migration::{StoreDelta, UpgradeOutcome};
use super::store::ObjectStore;
use crate::error::Error;

/// Tree name for database metadata.
const META_TREE: &str = "meta";

/// Meta key holding the schema version (u64, big-endian).
const VERSION_KEY: &[u8] = b"version";

/// Meta key prefix for persisted store definitions.
const STORE_PREFIX: &[u8] = b"store:";

/// State shared by every connection to one database.
pub(crate) struct DatabaseShared {
    name: String,
    db: Db,
    meta: Tree,
    stores: RwLock<BTreeMap<String, ObjectStore>>,
    connections: AtomicUsize,
    // Held while connecting and while an upgrade checks and changes stores
    schema: Mutex<()>,
    durable: bool,
}

impl DatabaseShared {
    /// Open the sled instance for a database and load its stores.
    ///
    /// Returns whether the database was created by this call.
    pub(crate) fn open(config: &StorageConfig, name: &str) -> Result<(Self, bool), Error> {
        let db = config.to_sled_config(name).open()?;
        let meta = db.open_tree(META_TREE)?;

        let created = meta.get(VERSION_KEY)?.is_none();
        if created {
            meta.insert(VERSION_KEY, 1u64.to_be_bytes().to_vec())?;
        }

        let mut stores = BTreeMap::new();
        for item in meta.scan_prefix(STORE_PREFIX) {
            let (_, value) = item?;
            let def: StoreDef = serde_json::from_slice(&value)
                .map_err(|e| Error::Deserialization(e.to_string()))?;
            let store = ObjectStore::open(&db, def, config.durable_commits)?;
            stores.insert(store.name().to_string(), store);
        }

        Ok((
            Self {
                name: name.to_string(),
                db,
                meta,
                stores: RwLock::new(stores),
                connections: AtomicUsize::new(0),
                schema: Mutex::new(()),
                durable: config.durable_commits,
            },
            created,
        ))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn version(&self) -> Result<u64, Error> {
        let bytes = self.meta.get(VERSION_KEY)?.ok_or(Error::InvalidKey)?;
        let bytes = <[u8; 8]>::try_from(&bytes[..]).map_err(|_| Error::InvalidKey)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Create every store in `desired` that does not exist yet.
    ///
    /// Bumps the schema version when something was created and
    /// `bump_version` is set.
    pub(crate) fn apply_stores(
        &self,
        desired: &[StoreDef],
        bump_version: bool,
    ) -> Result<StoreDelta, Error> {
        let mut stores = self.stores.write();
        let delta = StoreDelta::compute(stores.keys().map(String::as_str), desired);
        if delta.is_empty() {
            return Ok(delta);
        }

        for def in &delta.missing {
            let encoded =
                serde_json::to_vec(def).map_err(|e| Error::Serialization(e.to_string()))?;
            let store = ObjectStore::open(&self.db, def.clone(), self.durable)?;
            self.meta.insert(store_meta_key(&def.name), encoded)?;
            stores.insert(def.name.clone(), store);
        }

        let version = if bump_version {
            let next = self.version()? + 1;
            self.meta.insert(VERSION_KEY, next.to_be_bytes().to_vec())?;
            next
        } else {
            self.version()?
        };
        self.meta.flush()?;

        info!(
            database = %self.name,
            created = delta.len(),
            version,
            "stores created"
        );
        Ok(delta)
    }

    /// Create the stores in `desired` if the caller holds the only open
    /// connection. No connection can be added while this runs.
    ///
    /// Returns the number of other connections; nothing changed unless 0.
    pub(crate) fn upgrade_exclusive(&self, desired: &[StoreDef]) -> Result<usize, Error> {
        let _schema = self.schema.lock();
        let others = self.connections().saturating_sub(1);
        if others == 0 {
            self.apply_stores(desired, true)?;
        }
        Ok(others)
    }

    pub(crate) fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

fn store_meta_key(name: &str) -> Vec<u8> {
    let mut key = STORE_PREFIX.to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

/// One connection to a database.
///
/// Connections are counted per database; schema upgrades and deletes are
/// blocked while other connections are open. Dropping the handle closes it.
pub struct Database {
    shared: Arc<DatabaseShared>,
}

impl Database {
    pub(crate) fn connect(shared: Arc<DatabaseShared>) -> Self {
        {
            let _schema = shared.schema.lock();
            shared.connections.fetch_add(1, Ordering::SeqCst);
        }
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<DatabaseShared> {
        &self.shared
    }

    /// Database name.
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Persisted schema version, 1 for a newly created database.
    pub fn version(&self) -> Result<u64, Error> {
        self.shared.version()
    }

    /// Names of all stores, sorted.
    pub fn store_names(&self) -> Vec<String> {
        self.shared.stores.read().keys().cloned().collect()
    }

    /// Check if a store exists.
    pub fn has_store(&self, name: &str) -> bool {
        self.shared.stores.read().contains_key(name)
    }

    /// Handle to a store.
    pub fn store(&self, name: &str) -> Result<ObjectStore, Error> {
        self.shared
            .stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownStore(name.to_string()))
    }

    /// Handles to several stores, in the given order.
    pub fn stores<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ObjectStore>, Error> {
        names.iter().map(|name| self.store(name.as_ref())).collect()
    }

    /// Connections to this database other than this one.
    pub fn other_connections(&self) -> usize {
        self.shared.connections().saturating_sub(1)
    }

    /// Close the connection.
    pub fn close(self) {}

    /// Add stores to this database.
    ///
    /// Creates every store in `stores` that does not exist yet and bumps the
    /// version. While other connections are open nothing changes and the
    /// handle comes back in [`UpgradeOutcome::Blocked`].
    pub async fn upgrade(self, stores: Vec<StoreDef>) -> Result<UpgradeOutcome, Error> {
        let shared = self.shared.clone();
        let others =
            tokio::task::spawn_blocking(move || shared.upgrade_exclusive(&stores)).await??;

        if others > 0 {
            warn!(
                database = %self.name(),
                open_connections = others,
                "upgrade blocked by open connections"
            );
            return Ok(UpgradeOutcome::Blocked {
                database: self,
                open_connections: others,
            });
        }
        Ok(UpgradeOutcome::Upgraded(self))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shared.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("connections", &self.shared.connections())
            .finish()
    }
}
