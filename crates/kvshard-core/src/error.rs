//! Core error types.

use thiserror::Error;

/// Core storage and scan errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Database or store name that cannot be used as a storage path.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Store does not exist in the database.
    #[error("unknown store: {0}")]
    UnknownStore(String),

    /// Index does not exist on the store.
    #[error("unknown index {index} on store {store}")]
    UnknownIndex {
        /// Store the index was looked up on.
        store: String,
        /// Requested index name.
        index: String,
    },

    /// Database is not open in this environment.
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    /// Other connections prevent a schema change or delete.
    #[error("database {database} is blocked by {open_connections} other open connection(s)")]
    Blocked {
        /// Database name.
        database: String,
        /// Connections other than the caller's.
        open_connections: usize,
    },

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskJoin(err.to_string())
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(err: sled::transaction::TransactionError<Error>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => Error::Storage(e),
        }
    }
}
