//! Storage layer for kvshard.
//!
//! This module provides an IndexedDB-style object store on top of sled:
//! databases hold named stores, stores hold documents keyed by id, and
//! each store maintains its secondary indexes on write.

mod config;
mod cursor;
mod database;
mod environment;
mod index;
mod migration;
mod registry;
mod store;

pub mod key;

pub use config::StorageConfig;
pub use cursor::IndexCursor;
pub use database::Database;
pub use environment::Environment;
pub use index::{
    default_indexes, Field, IndexDef, StoreDef, AGE_INDEX, BOOL_TIMESTAMP_INDEX, CUSTOM_AGE_INDEX,
};
pub use key::{IndexKey, KeyPart, KeyRange};
pub use migration::{StoreDelta, UpgradeOutcome};
pub use registry::StoreRegistry;
pub use store::{Index, ObjectStore};
