use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gargote_core::definition::load_test;
use gargote_core::engine::{run_swarm, spawn_monitor_loop, RunContext, SwarmMonitor};
use gargote_core::http::HttpClient;
use gargote_core::results::export::{export_csv, export_json};
use gargote_core::results::stats::build_report;
use gargote_core::results::ResultStore;

/// Run a scripted HTTP load test described in a YAML file.
#[derive(Debug, Parser)]
#[command(name = "gargote", version, about)]
struct Cli {
    /// Test definition file.
    file: PathBuf,

    /// Log filter (e.g. `info`, `gargote_core=debug`). Defaults to RUST_LOG,
    /// then `warn`.
    #[arg(long)]
    log_level: Option<String>,

    /// Period of the concurrency display, in milliseconds.
    #[arg(long, default_value_t = 500)]
    monitor_interval_ms: u64,

    /// Write the report as JSON to this path.
    #[arg(long)]
    export_json: Option<PathBuf>,

    /// Write every recorded action attempt as CSV to this path.
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    #[arg(long)]
    insecure: bool,
}

fn init_logging(log_level: Option<&str>) {
    let env_filter = match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{level}', falling back to 'warn'");
            EnvFilter::new("warn")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    tracing::info!("Starting...");

    let test = load_test(&cli.file)
        .await
        .with_context(|| format!("unable to load test '{}'", cli.file.display()))?;
    let test = Arc::new(test);

    let client = HttpClient::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()
        .context("unable to build HTTP client")?;
    let store = Arc::new(ResultStore::new());
    let ctx = RunContext::new(client, Arc::clone(&store));

    let monitor = SwarmMonitor::new();
    let cancel = CancellationToken::new();
    let display = spawn_monitor_loop(
        monitor.clone(),
        Duration::from_millis(cli.monitor_interval_ms),
        cancel.clone(),
        |current, maximum| println!("{current} / {maximum}"),
    );

    let summary = run_swarm(&ctx, &test, &monitor).await;

    cancel.cancel();
    display.await.context("concurrency display task failed")?;

    tracing::info!(
        "Run {} finished: {} launched, {} completed, {} abandoned",
        summary.run_id,
        summary.launched,
        summary.completed,
        summary.abandoned
    );

    let report = build_report(&test, &store);
    for request in &report.requests {
        println!("{request}");
    }
    println!(
        "Iterations: {} completed, {} abandoned, max concurrency {}, duration {:.3}s",
        summary.completed,
        summary.abandoned,
        summary.max_concurrency,
        summary.duration.as_secs_f64()
    );

    if let Some(path) = &cli.export_json {
        let json = export_json(&report).context("unable to serialize report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("unable to write '{}'", path.display()))?;
    }

    if let Some(path) = &cli.export_csv {
        let csv = export_csv(&report, &store.scan());
        tokio::fs::write(path, csv)
            .await
            .with_context(|| format!("unable to write '{}'", path.display()))?;
    }

    Ok(())
}
