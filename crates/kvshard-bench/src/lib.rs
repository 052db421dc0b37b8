//! kvshard benchmark suite
//!
//! Compares ways of laying documents out over databases and stores, and
//! ways of reading them back, on the kvshard object store.
//!
//! # Experiments
//!
//! - **per-store**: one database with many stores vs one database per store
//! - **sharding**: shard layouts crossed with cursor, batched and bulk reads
//! - **dynamic-stores**: adding stores to a database that already has data
//! - **sorted-read-write**: generation order vs id order for writes and reads

pub mod config;
pub mod error;
pub mod experiments;
pub mod fixtures;
pub mod harness;

pub use config::{Args, BenchConfig};
pub use error::Error;
pub use experiments::{run_experiment, ExperimentKind};
pub use fixtures::{AgeDistribution, DocumentGenerator};
pub use harness::{run_test_case, trimmed_mean_ms, BenchmarkReport, TestCase};
