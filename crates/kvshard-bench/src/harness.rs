//! Benchmark driver.
//!
//! A [`TestCase`] is an ordered list of metrics, each mapping strategy labels
//! to one timed asynchronous operation. [`run_test_case`] builds a fresh test
//! case per run, executes every metric with its strategies in shuffled order,
//! and reduces the samples to a trimmed mean per `(metric, strategy)`.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::config::BenchConfig;
use crate::error::Error;

type Operation = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), Error>> + Send>;

struct Metric {
    name: String,
    strategies: Vec<(String, Operation)>,
}

/// Metrics of one run, in execution order.
#[derive(Default)]
pub struct TestCase {
    metrics: Vec<Metric>,
}

impl TestCase {
    /// Create an empty test case.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy to a metric, creating the metric on first use.
    ///
    /// Metrics run in the order they were first added.
    pub fn add<F, Fut>(&mut self, metric: &str, strategy: &str, operation: F) -> &mut Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let operation: Operation = Box::new(move || operation().boxed());
        match self.metrics.iter_mut().find(|m| m.name == metric) {
            Some(existing) => existing.strategies.push((strategy.to_string(), operation)),
            None => self.metrics.push(Metric {
                name: metric.to_string(),
                strategies: vec![(strategy.to_string(), operation)],
            }),
        }
        self
    }

    /// Metric names in execution order.
    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    /// Strategy labels of a metric, in insertion order.
    pub fn strategy_names(&self, metric: &str) -> Vec<&str> {
        self.metrics
            .iter()
            .find(|m| m.name == metric)
            .map(|m| m.strategies.iter().map(|(s, _)| s.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Elapsed times of one run, milliseconds per strategy.
#[derive(Debug, Clone, Serialize)]
pub struct MetricTimings {
    pub metric: String,
    pub strategies: BTreeMap<String, f64>,
}

/// Timings of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run: usize,
    pub metrics: Vec<MetricTimings>,
}

/// Trimmed mean per strategy, whole milliseconds rounded up.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    pub strategies: BTreeMap<String, u64>,
}

/// Result of [`run_test_case`].
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub experiment: String,
    pub runs: Vec<RunResult>,
    pub summary: Vec<MetricSummary>,
}

impl BenchmarkReport {
    /// Summary of one metric.
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.summary.iter().find(|m| m.metric == name)
    }
}

/// Run `factory`'s test case `config.runs` times and summarize the timings.
///
/// The first failing operation aborts the benchmark and its error is
/// returned.
pub async fn run_test_case<F, Fut>(
    experiment: &str,
    mut factory: F,
    config: &BenchConfig,
) -> Result<BenchmarkReport, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TestCase, Error>>,
{
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut runs = Vec::with_capacity(config.runs);
    // Samples keyed by metric position, so the summary keeps execution order
    let mut samples: Vec<(String, BTreeMap<String, Vec<Duration>>)> = Vec::new();

    for run in 1..=config.runs {
        let test_case = factory().await?;
        let mut timings = Vec::with_capacity(test_case.metrics.len());

        for metric in test_case.metrics {
            let mut strategies = metric.strategies;
            strategies.shuffle(&mut rng);

            let mut elapsed_by_strategy = BTreeMap::new();
            for (strategy, operation) in strategies {
                if !config.delay.is_zero() {
                    tokio::time::sleep(config.delay).await;
                }

                let start = Instant::now();
                operation().await?;
                let elapsed = start.elapsed();

                info!(
                    experiment,
                    run,
                    metric = %metric.name,
                    strategy = %strategy,
                    elapsed_ms = millis(elapsed),
                    "operation finished"
                );
                record(&mut samples, &metric.name, &strategy, elapsed);
                elapsed_by_strategy.insert(strategy, millis(elapsed));
            }

            timings.push(MetricTimings {
                metric: metric.name,
                strategies: elapsed_by_strategy,
            });
        }

        let result = RunResult {
            run,
            metrics: timings,
        };
        info!(
            experiment,
            run,
            result = %serde_json::to_string(&result)?,
            "run finished"
        );
        runs.push(result);
    }

    let summary: Vec<MetricSummary> = samples
        .into_iter()
        .map(|(metric, strategies)| MetricSummary {
            metric,
            strategies: strategies
                .into_iter()
                .filter_map(|(strategy, durations)| {
                    trimmed_mean_ms(&durations).map(|mean| (strategy, mean))
                })
                .collect(),
        })
        .collect();

    let report = BenchmarkReport {
        experiment: experiment.to_string(),
        runs,
        summary,
    };
    info!(
        experiment,
        summary = %serde_json::to_string(&report.summary)?,
        "benchmark finished"
    );
    Ok(report)
}

fn record(
    samples: &mut Vec<(String, BTreeMap<String, Vec<Duration>>)>,
    metric: &str,
    strategy: &str,
    elapsed: Duration,
) {
    let position = match samples.iter().position(|(name, _)| name == metric) {
        Some(position) => position,
        None => {
            samples.push((metric.to_string(), BTreeMap::new()));
            samples.len() - 1
        }
    };
    samples[position]
        .1
        .entry(strategy.to_string())
        .or_default()
        .push(elapsed);
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Mean of the samples after dropping the slowest `ceil(n / 10)`, in whole
/// milliseconds rounded up. At least one sample is always kept.
///
/// Returns None for an empty sample set.
pub fn trimmed_mean_ms(samples: &[Duration]) -> Option<u64> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort();
    let dropped = sorted.len().div_ceil(10);
    let kept = (sorted.len() - dropped).max(1);

    let total: f64 = sorted[..kept].iter().copied().map(millis).sum();
    Some((total / kept as f64).ceil() as u64)
}
