//! kvshard core - document model, shard routing and the embedded object store.
//!
//! This crate provides the pieces every layout experiment is built from:
//! the generated [`Document`], the [`shard_key`] routing function, the
//! [`compare_by_age_then_id`] ordering, an asynchronous sled-backed object
//! store with secondary indexes, and the read strategies measured against it.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod document;
pub mod error;
pub mod scan;
pub mod shard;
pub mod storage;

pub use document::{
    compare_by_age_then_id, pad_age, stringify_age, Document, Nested, NestedOb, NestedTed, Pair,
};
pub use error::Error;
pub use scan::{
    age_range, batched_custom_index_scan, batched_range_scan, batched_range_scan_with_stats,
    find_by_ids, find_via_cursor, find_via_get_all, read_all, scan_partitions, ScanStats,
};
pub use shard::{hash_string, shard_key, ShardRouter};
pub use storage::{
    Database, Environment, Field, Index, IndexCursor, IndexDef, IndexKey, KeyPart, KeyRange,
    ObjectStore, StorageConfig, StoreDef, StoreDelta, StoreRegistry, UpgradeOutcome,
};
