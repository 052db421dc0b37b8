//! End-to-end experiment runs on temporary storage with verification on.

use kvshard_bench::{
    run_experiment, AgeDistribution, BenchConfig, BenchmarkReport, Error, ExperimentKind,
};
use kvshard_core::StorageConfig;

fn config(documents: usize) -> BenchConfig {
    BenchConfig::quick().with_documents(documents)
}

fn metric_names(report: &BenchmarkReport) -> Vec<&str> {
    report.summary.iter().map(|m| m.metric.as_str()).collect()
}

fn strategies<'a>(report: &'a BenchmarkReport, metric: &str) -> Vec<&'a str> {
    report
        .metric(metric)
        .map(|m| m.strategies.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_per_store_experiment() {
    let report = run_experiment(ExperimentKind::PerStore, &config(50)).await.unwrap();

    assert_eq!(report.experiment, "per-store");
    assert_eq!(
        metric_names(&report),
        vec!["open", "insert", "read", "read-by-id", "cleanup"]
    );
    for metric in metric_names(&report) {
        assert_eq!(strategies(&report, metric), vec!["a", "b", "c"]);
    }
}

#[tokio::test]
async fn test_sharding_experiment() {
    let report = run_experiment(ExperimentKind::Sharding, &config(400)).await.unwrap();

    assert_eq!(
        metric_names(&report),
        vec![
            "open",
            "insert",
            "read",
            "read-by-id",
            "read-by-cursor",
            "read-by-batched-cursor-10",
            "read-by-batched-cursor-50",
            "read-by-batched-cursor-10000",
            "read-by-batched-cursor-custom-index",
            "read-by-get-all",
            "cleanup",
        ]
    );
    assert_eq!(
        strategies(&report, "read-by-cursor"),
        vec!["a", "b", "c", "d", "e"]
    );
}

#[tokio::test]
async fn test_sharding_with_normal_ages_verifies() {
    let config = config(300).with_age_distribution(AgeDistribution::Normal);
    let report = run_experiment(ExperimentKind::Sharding, &config).await.unwrap();
    assert!(report.metric("read-by-batched-cursor-custom-index").is_some());
}

#[tokio::test]
async fn test_dynamic_stores_experiment() {
    let report = run_experiment(ExperimentKind::DynamicStores, &config(1))
        .await
        .unwrap();

    assert_eq!(
        metric_names(&report),
        vec!["open-insert-close", "open-with-more-stores", "cleanup"]
    );
    assert_eq!(strategies(&report, "open-with-more-stores"), vec!["a", "b"]);
}

#[tokio::test]
async fn test_sorted_read_write_experiment() {
    let report = run_experiment(ExperimentKind::SortedReadWrite, &config(100))
        .await
        .unwrap();

    assert_eq!(
        metric_names(&report),
        vec!["open", "insert", "read", "read-by-id", "cleanup"]
    );
    assert_eq!(strategies(&report, "read"), vec!["a", "b"]);
}

#[tokio::test]
async fn test_repeated_runs_summarize_every_strategy() {
    let config = config(20).with_runs(3);
    let report = run_experiment(ExperimentKind::SortedReadWrite, &config)
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.runs[2].run, 3);
    for summary in &report.summary {
        assert_eq!(summary.strategies.len(), 2);
    }
}

#[tokio::test]
async fn test_experiment_on_disk_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(30).with_storage(StorageConfig::new(dir.path()));

    run_experiment(ExperimentKind::PerStore, &config).await.unwrap();

    // Every database is deleted by the cleanup metric
    let remaining = std::fs::read_dir(dir.path())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_report_serializes() {
    let report = run_experiment(ExperimentKind::DynamicStores, &config(1))
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["experiment"], "dynamic-stores");
    assert!(json["summary"][0]["strategies"]["a"].is_u64());
}

#[test]
fn test_error_display() {
    let err = Error::Verification("expected 3, got 2".to_string());
    assert_eq!(err.to_string(), "verification failed: expected 3, got 2");
}
