//! Storage environment: opens, tracks and deletes databases.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::config::{validate_name, StorageConfig};
use super::database::{Database, DatabaseShared};
use super::registry::StoreRegistry;
use crate::error::Error;

/// A set of named databases under one storage root.
///
/// Opens and deletes are serialized per environment. A database stays
/// loaded until it is deleted, so reopening a closed database is cheap.
pub struct Environment {
    config: StorageConfig,
    databases: Mutex<HashMap<String, Arc<DatabaseShared>>>,
}

impl Environment {
    /// Create an environment with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            databases: Mutex::new(HashMap::new()),
        }
    }

    /// Create an environment of temporary databases.
    pub fn temporary() -> Self {
        Self::new(StorageConfig::temporary())
    }

    /// Storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Open or create a database and make sure every store the registry
    /// requires for it exists.
    ///
    /// Creating stores on an existing database bumps its version.
    pub async fn open_database(
        &self,
        name: &str,
        registry: &StoreRegistry,
    ) -> Result<Database, Error> {
        if !validate_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }

        let mut databases = self.databases.lock().await;
        let (shared, created) = match databases.get(name) {
            Some(shared) => (shared.clone(), false),
            None => {
                let config = self.config.clone();
                let owned = name.to_string();
                let (shared, created) =
                    tokio::task::spawn_blocking(move || DatabaseShared::open(&config, &owned))
                        .await??;
                let shared = Arc::new(shared);
                databases.insert(name.to_string(), shared.clone());
                (shared, created)
            }
        };

        let required = registry.stores_for(name).to_vec();
        if !required.is_empty() {
            let target = shared.clone();
            tokio::task::spawn_blocking(move || target.apply_stores(&required, !created))
                .await??;
        }

        debug!(database = %name, created, "database opened");
        Ok(Database::connect(shared))
    }

    /// Close the connection and delete the database with all its stores.
    ///
    /// Fails with [`Error::Blocked`] while other connections are open.
    pub async fn delete_database(&self, database: Database) -> Result<(), Error> {
        let mut databases = self.databases.lock().await;

        let others = database.other_connections();
        if others > 0 {
            return Err(Error::Blocked {
                database: database.name().to_string(),
                open_connections: others,
            });
        }

        let name = database.name().to_string();
        let shared = match databases.remove(&name) {
            Some(shared) if Arc::ptr_eq(&shared, database.shared()) => shared,
            Some(other) => {
                databases.insert(name.clone(), other);
                return Err(Error::DatabaseNotFound(name));
            }
            None => return Err(Error::DatabaseNotFound(name)),
        };
        drop(database);

        let path = (!self.config.temporary).then(|| self.config.database_path(&name));
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            shared.flush()?;
            drop(shared);
            if let Some(path) = path {
                if path.exists() {
                    std::fs::remove_dir_all(&path)?;
                }
            }
            Ok(())
        })
        .await??;

        info!(database = %name, "database deleted");
        Ok(())
    }

    /// Close every given connection, then delete each distinct database.
    pub async fn delete_databases(&self, databases: Vec<Database>) -> Result<(), Error> {
        let mut last_by_name: HashMap<String, Database> = HashMap::new();
        for database in databases {
            // Replacing drops (closes) the earlier connection
            last_by_name.insert(database.name().to_string(), database);
        }
        for (_, database) in last_by_name {
            self.delete_database(database).await?;
        }
        Ok(())
    }

    /// Names of the databases currently loaded.
    pub async fn database_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.databases.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}
