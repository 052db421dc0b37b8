//! kvshard benchmark runner.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvshard_bench::{run_experiment, Args};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvshard_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let experiment = args.experiment;
    let output = args.output.clone();
    let config = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        experiment = experiment.name(),
        runs = config.runs,
        delay_ms = config.delay.as_millis() as u64,
        seed = ?config.seed,
        verify = config.verify,
        ages = ?config.ages,
        temporary = config.storage.temporary,
        "starting benchmark"
    );

    let report = match run_experiment(experiment, &config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "benchmark failed");
            return Err(e.into());
        }
    };

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{}", json),
    }

    Ok(())
}
