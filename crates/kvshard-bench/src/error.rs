//! Benchmark error types.

use thiserror::Error;

/// Benchmark errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] kvshard_core::Error),

    /// A read returned something other than the expected documents.
    #[error("verification failed: {0}")]
    Verification(String),

    /// An operation ran before the one that sets up its state.
    #[error("missing state: {0}")]
    MissingState(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
