//! Engine facade: one explicitly constructed instance owning the connection
//! pool, passed by reference to every operation. There is no implicit
//! singleton; multiple engines may run against the same store.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ingest::{self, IngestReport};
use crate::models::{DeviceStats, SensorReading};
use crate::parser::{self, BatteryPolicy};
use crate::partition;
use crate::query::{self, ReadingFilter};
use crate::schema;
use crate::stats;

// ---

/// The ingestion-and-query engine.
///
/// Ingestion and query calls are independent tasks multiplexed over the
/// shared pool; the only suspension points are the storage round-trips.
/// Pool checkout is bounded by the configured acquire timeout, so an
/// exhausted pool surfaces as a retryable error instead of a hang.
pub struct SensorEngine {
    // ---
    pool: PgPool,
    batch_size: usize,
    query_max_limit: u32,
    battery_policy: BatteryPolicy,
    partition_past_months: u32,
    partition_future_months: u32,
}

impl SensorEngine {
    /// Connect a new engine using the configured pool bounds.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        // ---
        let pool = PgPoolOptions::new()
            .max_connections(cfg.db_pool_max)
            .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs.into()))
            .connect(&cfg.db_url)
            .await?;
        Ok(Self::with_pool(pool, cfg))
    }

    /// Build an engine around an existing pool.
    pub fn with_pool(pool: PgPool, cfg: &Config) -> Self {
        // ---
        Self {
            pool,
            batch_size: cfg.ingest_batch_size as usize,
            query_max_limit: cfg.query_max_limit,
            battery_policy: cfg.battery_policy,
            partition_past_months: cfg.partition_past_months,
            partition_future_months: cfg.partition_future_months,
        }
    }

    /// The underlying pool, for collaborators that issue their own queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if needed and materialize the retention span of
    /// partitions around the current month. Idempotent; called on startup.
    pub async fn ensure_schema(&self) -> Result<()> {
        // ---
        schema::create_schema(&self.pool).await?;
        partition::ensure_default_window(
            &self.pool,
            Utc::now(),
            self.partition_past_months,
            self.partition_future_months,
        )
        .await
    }

    // === Ingestion ===

    /// Ingest one delimited text file.
    ///
    /// Always returns a complete report when the file is readable, even if
    /// every line fails to parse or every batch fails to commit.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        // ---
        let file = std::fs::File::open(path)?;
        let mut lines = Vec::new();
        for line in std::io::BufReader::new(file).lines() {
            lines.push(line?);
        }
        info!("Ingesting {} ({} lines)", path.display(), lines.len());
        Ok(self.ingest_lines(&lines).await)
    }

    /// Parse and commit an in-memory sequence of lines.
    ///
    /// Per-line problems are recovered locally: the line is skipped, the
    /// skip is logged with its reason and raw content, and the run
    /// continues. Batches commit in submission order; a failed batch is
    /// reported and the remaining batches still run.
    pub async fn ingest_lines<I>(&self, lines: I) -> IngestReport
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        // ---
        let mut report = IngestReport::default();
        let mut accepted = Vec::new();

        for outcome in parser::parse_lines(lines, self.battery_policy) {
            match outcome {
                Ok(parsed) => {
                    if let Some(raw) = &parsed.malformed_mac {
                        warn!(
                            device = %parsed.reading.device_type,
                            mac = %raw,
                            "malformed device address dropped"
                        );
                    }
                    if parsed.battery_clamped {
                        warn!(
                            device = %parsed.reading.device_type,
                            "battery level out of range, clamped"
                        );
                    }
                    report.record_accepted(&parsed);
                    accepted.push(parsed.reading);
                }
                Err(rejection) => {
                    warn!(
                        line = rejection.line_number,
                        reason = rejection.reason.label(),
                        raw = %rejection.line,
                        "line skipped"
                    );
                    report.record_rejected(&rejection);
                }
            }
        }

        let writes = ingest::write_readings(&self.pool, &accepted, self.batch_size).await;
        report.absorb_writes(writes);

        info!(
            accepted = report.accepted,
            rejected = report.rejected_total(),
            rows_committed = report.rows_committed,
            batches_failed = report.batches_failed(),
            "ingestion run complete"
        );
        report
    }

    // === Queries ===

    /// Run any composed filter.
    pub async fn query(&self, filter: &ReadingFilter) -> Result<Vec<SensorReading>> {
        query::fetch_readings(&self.pool, filter, self.query_max_limit).await
    }

    /// Most recent `limit` readings across all devices, newest first.
    pub async fn query_by_recency(&self, limit: u32) -> Result<Vec<SensorReading>> {
        self.query(&ReadingFilter::recent(limit)).await
    }

    /// Most recent `limit` readings for one device, newest first.
    pub async fn query_by_device(
        &self,
        device_type: &str,
        limit: u32,
    ) -> Result<Vec<SensorReading>> {
        self.query(&ReadingFilter::by_device(device_type, limit)).await
    }

    /// Readings with `start <= instant < end`, oldest first, capped at
    /// `limit`.
    pub async fn query_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SensorReading>> {
        self.query(&ReadingFilter::time_range(start, end, limit)).await
    }

    // === Statistics ===

    /// Per-device summary statistics, optionally restricted to a subset of
    /// device types. Devices with no stored readings are absent from the
    /// result.
    pub async fn device_statistics(
        &self,
        devices: Option<&[String]>,
        include_channels: bool,
    ) -> Result<BTreeMap<String, DeviceStats>> {
        stats::device_statistics(&self.pool, devices, include_channels).await
    }
}
