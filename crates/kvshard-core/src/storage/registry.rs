//! Required stores per database.

use std::collections::BTreeMap;

use super::index::StoreDef;

/// Mapping from database name to the stores that must exist once the
/// database is open.
///
/// Owned by the caller and passed into
/// [`Environment::open_database`](super::Environment::open_database).
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    databases: BTreeMap<String, Vec<StoreDef>>,
}

impl StoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require stores for a database. Stores already registered under the
    /// same name keep their first definition.
    pub fn require(
        &mut self,
        database: impl Into<String>,
        stores: impl IntoIterator<Item = StoreDef>,
    ) -> &mut Self {
        let entry = self.databases.entry(database.into()).or_default();
        for store in stores {
            if !entry.iter().any(|s| s.name == store.name) {
                entry.push(store);
            }
        }
        self
    }

    /// Builder form of [`require`](Self::require) using default store
    /// definitions for each name.
    pub fn with_stores<I, S>(mut self, database: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(database, names.into_iter().map(StoreDef::new));
        self
    }

    /// Stores required for a database, empty when none are registered.
    pub fn stores_for(&self, database: &str) -> &[StoreDef] {
        self.databases
            .get(database)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registered database names.
    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }
}
