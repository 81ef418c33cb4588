//! Entry point for the `motionstore` batch import tool.
//!
//! This binary drives the full import sequence for a set of device-log
//! files, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema and retention-window partitions
//! - Ingesting each file named on the command line, batch by batch
//! - Printing per-device statistics as JSON once the run completes
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `MOTION_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `MOTION_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! Schema setup is delegated to the engine, configuration parsing to
//! `config`, so this file stays a thin driver.

use std::{env, io::IsTerminal, path::Path, process::ExitCode};

use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use motionstore::{config, SensorEngine};

// ---

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ---
    init_tracing();
    dotenv().ok();

    let files: Vec<String> = env::args().skip(1).collect();
    if files.is_empty() {
        anyhow::bail!("usage: motionstore <data-file>...");
    }

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database");
    let engine = SensorEngine::connect(&cfg)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    tracing::info!("Successfully connected to database");

    engine.ensure_schema().await?;

    let mut total_rows = 0usize;
    let mut failed_files = 0usize;

    for file in &files {
        match engine.ingest_file(Path::new(file)).await {
            Ok(report) => {
                tracing::info!(
                    file = %file,
                    accepted = report.accepted,
                    rejected = report.rejected_total(),
                    battery_clamped = report.battery_clamped,
                    mac_anomalies = report.mac_anomalies,
                    rows_committed = report.rows_committed,
                    batches_failed = report.batches_failed(),
                    "file ingested"
                );
                total_rows += report.rows_committed;
                if report.batches_failed() > 0 {
                    failed_files += 1;
                }
            }
            Err(e) => {
                tracing::error!(file = %file, error = %e, "file ingestion failed");
                failed_files += 1;
            }
        }
    }

    tracing::info!(
        "Import complete: {} rows from {} files ({} with failures)",
        total_rows,
        files.len(),
        failed_files
    );

    // Summarize what the store now holds, channel extremes included
    let stats = engine.device_statistics(None, true).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(if failed_files == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `MOTION_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `MOTION_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("MOTION_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to MOTION_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("MOTION_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
