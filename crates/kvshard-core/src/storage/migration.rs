//! Store-set migrations.
//!
//! Adding stores to an existing database is an explicit step: compute the
//! delta between the stores that exist and the desired superset, then apply
//! it. Other open connections block the step instead of being ignored.

use std::collections::HashSet;

use super::database::Database;
use super::index::StoreDef;
use crate::error::Error;

/// Stores that must be created to reach a desired store set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreDelta {
    /// Store definitions missing from the database, in desired order.
    pub missing: Vec<StoreDef>,
}

impl StoreDelta {
    /// Compute the stores in `desired` that are not in `existing`.
    pub fn compute<'a>(existing: impl IntoIterator<Item = &'a str>, desired: &[StoreDef]) -> Self {
        let existing: HashSet<&str> = existing.into_iter().collect();
        let mut seen = HashSet::new();
        let missing = desired
            .iter()
            .filter(|def| !existing.contains(def.name.as_str()))
            .filter(|def| seen.insert(def.name.clone()))
            .cloned()
            .collect();
        Self { missing }
    }

    /// Check if there is nothing to create.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }

    /// Number of stores to create.
    pub fn len(&self) -> usize {
        self.missing.len()
    }

    /// Names of the stores to create.
    pub fn names(&self) -> Vec<&str> {
        self.missing.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Result of [`Database::upgrade`].
#[derive(Debug)]
pub enum UpgradeOutcome {
    /// The missing stores were created and the version bumped.
    Upgraded(Database),
    /// Other connections were open; nothing was changed.
    Blocked {
        /// The caller's handle, unchanged.
        database: Database,
        /// Connections other than the caller's.
        open_connections: usize,
    },
}

impl UpgradeOutcome {
    /// Check if the upgrade was blocked.
    pub fn is_blocked(&self) -> bool {
        matches!(self, UpgradeOutcome::Blocked { .. })
    }

    /// The database handle, upgraded or not.
    pub fn into_database(self) -> Database {
        match self {
            UpgradeOutcome::Upgraded(database) => database,
            UpgradeOutcome::Blocked { database, .. } => database,
        }
    }

    /// The upgraded handle, or [`Error::Blocked`].
    pub fn into_result(self) -> Result<Database, Error> {
        match self {
            UpgradeOutcome::Upgraded(database) => Ok(database),
            UpgradeOutcome::Blocked {
                database,
                open_connections,
            } => Err(Error::Blocked {
                database: database.name().to_string(),
                open_connections,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_only_contains_missing_stores() {
        let desired = vec![StoreDef::new("a"), StoreDef::new("b"), StoreDef::new("c")];
        let delta = StoreDelta::compute(["a", "c"], &desired);
        assert_eq!(delta.names(), vec!["b"]);
        assert_eq!(delta.len(), 1);
    }

    #[test]
    fn test_delta_is_empty_for_subset() {
        let desired = vec![StoreDef::new("a")];
        assert!(StoreDelta::compute(["a", "b"], &desired).is_empty());
        assert!(StoreDelta::compute([], &[]).is_empty());
    }

    #[test]
    fn test_delta_deduplicates_desired_names() {
        let desired = vec![StoreDef::new("a"), StoreDef::without_indexes("a")];
        let delta = StoreDelta::compute([], &desired);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.missing[0].indexes.len(), 3);
    }
}
