//! Storage configuration.

use std::path::{Path, PathBuf};

/// Configuration for a storage environment.
///
/// Every database opened through an [`Environment`](super::Environment)
/// gets its own sled instance under `path/<database name>`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per database.
    pub path: PathBuf,

    /// Page cache capacity in bytes, per database.
    pub cache_capacity: u64,

    /// Background flush interval in milliseconds. None disables it.
    pub flush_every_ms: Option<u64>,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary databases (deleted on drop).
    pub temporary: bool,

    /// Wait for a flush to disk before a write batch reports completion.
    ///
    /// When false, a batch completes once the sled transaction commits and
    /// durability is left to the background flusher.
    pub durable_commits: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./kvshard_data"),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            flush_every_ms: Some(1000),
            compression: false,
            temporary: false,
            durable_commits: false,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration rooted at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            cache_capacity: 16 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Set the per-database cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the background flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Wait for a disk flush after every write batch.
    pub fn with_durable_commits(mut self, durable: bool) -> Self {
        self.durable_commits = durable;
        self
    }

    /// Directory used for a database.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Convert to sled configuration for one database.
    pub(crate) fn to_sled_config(&self, name: &str) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_every_ms);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(self.database_path(name));
        }

        config
    }
}

/// Check that a database name is usable as a single path component.
pub(crate) fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && Path::new(name).components().count() == 1
        && !name.contains(['/', '\\'])
}
