//! Benchmark configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kvshard_core::StorageConfig;

use crate::experiments::ExperimentKind;
use crate::fixtures::AgeDistribution;

/// Default number of runs per experiment.
pub const DEFAULT_RUNS: usize = 10;

/// Default pause before every timed operation, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Benchmark driver configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of runs; every run builds a fresh test case.
    pub runs: usize,

    /// Pause before every timed operation.
    pub delay: Duration,

    /// Seed for strategy shuffling and document generation.
    /// None draws a fresh seed per driver.
    pub seed: Option<u64>,

    /// Check read results against the expected documents.
    pub verify: bool,

    /// Overrides the experiment's default document count.
    pub documents: Option<usize>,

    /// Distribution of generated document ages.
    pub ages: AgeDistribution,

    /// Storage settings for every database the experiments open.
    pub storage: StorageConfig,
}

impl BenchConfig {
    /// Configuration with default settings on temporary storage.
    pub fn new() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            seed: None,
            verify: true,
            documents: None,
            ages: AgeDistribution::Uniform,
            storage: StorageConfig::temporary(),
        }
    }

    /// Configuration for quick runs: one run, no delay, fixed seed.
    pub fn quick() -> Self {
        Self::new()
            .with_runs(1)
            .with_delay(Duration::ZERO)
            .with_seed(0)
    }

    /// Set the number of runs.
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    /// Set the pause before every timed operation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fix the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable result verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Override the document count.
    pub fn with_documents(mut self, documents: usize) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Set the age distribution of generated documents.
    pub fn with_age_distribution(mut self, ages: AgeDistribution) -> Self {
        self.ages = ages;
        self
    }

    /// Set the storage configuration.
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Document count for an experiment whose default is `default`.
    pub fn document_count(&self, default: usize) -> usize {
        self.documents.unwrap_or(default)
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the benchmark runner.
#[derive(Parser, Debug)]
#[command(name = "kvshard-bench")]
#[command(version, about = "Sharding and layout benchmarks", long_about = None)]
pub struct Args {
    /// Experiment to run.
    #[arg(value_enum)]
    pub experiment: ExperimentKind,

    /// Number of runs.
    #[arg(short, long, default_value_t = DEFAULT_RUNS)]
    pub runs: usize,

    /// Pause before every timed operation, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Seed for shuffling and document generation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip result verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Override the experiment's document count.
    #[arg(long)]
    pub documents: Option<usize>,

    /// Distribution of generated document ages.
    #[arg(long, value_enum, default_value_t = AgeDistribution::Uniform)]
    pub age_distribution: AgeDistribution,

    /// Storage directory. Temporary storage is used when omitted.
    #[arg(short, long)]
    pub data_path: Option<PathBuf>,

    /// Wait for a disk flush after every write batch.
    #[arg(long)]
    pub durable: bool,

    /// Enable zstd compression.
    #[arg(long)]
    pub compression: bool,

    /// Per-database cache capacity in megabytes.
    #[arg(long)]
    pub cache_mb: Option<u64>,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Convert command-line arguments to benchmark configuration.
    pub fn into_config(self) -> BenchConfig {
        let mut storage = match self.data_path {
            Some(path) => StorageConfig::new(path),
            None => StorageConfig::temporary(),
        };
        storage = storage
            .with_durable_commits(self.durable)
            .with_compression(self.compression);
        if let Some(mb) = self.cache_mb {
            storage = storage.with_cache_capacity(mb * 1024 * 1024);
        }

        BenchConfig {
            runs: self.runs,
            delay: Duration::from_millis(self.delay_ms),
            seed: self.seed,
            verify: !self.no_verify,
            documents: self.documents,
            ages: self.age_distribution,
            storage,
        }
    }
}
