//! Batch-write coordination against the partitioned readings table.
//!
//! Readings are committed in bounded-size batches, one atomic multi-row
//! insert per batch. The atomicity boundary is a single batch: a failure in
//! batch N never rolls back batches 1..N-1 and never stops batch N+1; the
//! caller gets a per-batch outcome and owns the retry policy. Batches commit
//! sequentially within one call to preserve insertion-order locality inside
//! each partition; independent calls may run concurrently.

use sqlx::{PgPool, QueryBuilder};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::models::NewReading;
use crate::parser::{LineRejection, ParsedLine, RejectReason};
use crate::partition;

// ---

/// Bound columns per inserted row.
const INSERT_COLUMNS: usize = 22;

/// Hard ceiling on rows per insert, keeping one multi-row statement under
/// the Postgres bind-parameter limit (65535).
const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / INSERT_COLUMNS;

/// Clamp the configured batch size into the range one statement can carry.
pub(crate) fn effective_batch_size(requested: usize) -> usize {
    requested.clamp(1, MAX_ROWS_PER_INSERT)
}

/// Result of one batch's atomic insert.
#[derive(Debug)]
pub struct BatchOutcome {
    /// 0-based position of the batch within the call.
    pub index: usize,
    pub rows: usize,
    /// `None` when the batch committed; the storage error otherwise.
    pub error: Option<EngineError>,
}

impl BatchOutcome {
    pub fn committed(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-call write summary: one outcome per batch, in submission order.
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub batches: Vec<BatchOutcome>,
    pub rows_committed: usize,
}

// ---

/// Summary of one file-ingestion run: parse tallies grouped by reason plus
/// the per-batch write outcomes. A run always completes with a report, even
/// when every line fails.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: RejectCounts,
    /// Lines kept with a battery value clamped into range.
    pub battery_clamped: usize,
    /// Lines kept after dropping a malformed device address.
    pub mac_anomalies: usize,
    pub rows_committed: usize,
    pub batches: Vec<BatchOutcome>,
}

/// Rejected-line tallies, one counter per skip reason.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RejectCounts {
    pub wrong_column_count: usize,
    pub bad_timestamp: usize,
    pub bad_device_label: usize,
    pub bad_numeric_field: usize,
}

impl RejectCounts {
    fn bump(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::WrongColumnCount { .. } => self.wrong_column_count += 1,
            RejectReason::BadTimestamp => self.bad_timestamp += 1,
            RejectReason::BadDeviceLabel => self.bad_device_label += 1,
            RejectReason::BadNumericField => self.bad_numeric_field += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.wrong_column_count + self.bad_timestamp + self.bad_device_label
            + self.bad_numeric_field
    }
}

impl IngestReport {
    pub fn record_accepted(&mut self, parsed: &ParsedLine) {
        // ---
        self.accepted += 1;
        if parsed.battery_clamped {
            self.battery_clamped += 1;
        }
        if parsed.malformed_mac.is_some() {
            self.mac_anomalies += 1;
        }
    }

    pub fn record_rejected(&mut self, rejection: &LineRejection) {
        self.rejected.bump(rejection.reason);
    }

    pub fn absorb_writes(&mut self, summary: WriteSummary) {
        self.rows_committed = summary.rows_committed;
        self.batches = summary.batches;
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.total()
    }

    pub fn batches_failed(&self) -> usize {
        self.batches.iter().filter(|b| !b.committed()).count()
    }
}

// ---

/// Commit an ordered sequence of readings in batches of at most
/// `batch_size` rows, returning one outcome per batch.
pub async fn write_readings(
    pool: &PgPool,
    readings: &[NewReading],
    batch_size: usize,
) -> WriteSummary {
    // ---
    let batch_size = effective_batch_size(batch_size);
    let mut summary = WriteSummary::default();

    for (index, batch) in readings.chunks(batch_size).enumerate() {
        match write_batch(pool, batch).await {
            Ok(()) => {
                debug!(batch = index, rows = batch.len(), "batch committed");
                summary.rows_committed += batch.len();
                summary.batches.push(BatchOutcome {
                    index,
                    rows: batch.len(),
                    error: None,
                });
            }
            Err(e) => {
                warn!(batch = index, rows = batch.len(), error = %e, "batch failed");
                summary.batches.push(BatchOutcome {
                    index,
                    rows: batch.len(),
                    error: Some(e),
                });
            }
        }
    }

    summary
}

/// One atomic multi-row insert, preceded by a partition cover check for the
/// batch's instant range.
async fn write_batch(pool: &PgPool, batch: &[NewReading]) -> Result<()> {
    // ---
    let Some((t_min, t_max)) = batch_bounds(batch) else {
        return Ok(());
    };
    partition::ensure_covering(pool, t_min, t_max).await?;

    let mut tx = pool.begin().await?;

    let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
        "INSERT INTO sensor_data (\
         timestamp, device_type, device_mac, \
         accel_x, accel_y, accel_z, \
         gyro_x, gyro_y, gyro_z, \
         angle_x, angle_y, angle_z, \
         mag_x, mag_y, mag_z, \
         quaternion_0, quaternion_1, quaternion_2, quaternion_3, \
         temperature, firmware_version, battery_level) ",
    );
    qb.push_values(batch, |mut b, r| {
        b.push_bind(r.timestamp)
            .push_bind(&r.device_type)
            .push_bind(&r.device_mac)
            .push_bind(r.accel_x)
            .push_bind(r.accel_y)
            .push_bind(r.accel_z)
            .push_bind(r.gyro_x)
            .push_bind(r.gyro_y)
            .push_bind(r.gyro_z)
            .push_bind(r.angle_x)
            .push_bind(r.angle_y)
            .push_bind(r.angle_z)
            .push_bind(r.mag_x)
            .push_bind(r.mag_y)
            .push_bind(r.mag_z)
            .push_bind(r.quaternion_0)
            .push_bind(r.quaternion_1)
            .push_bind(r.quaternion_2)
            .push_bind(r.quaternion_3)
            .push_bind(r.temperature)
            .push_bind(&r.firmware_version)
            .push_bind(r.battery_level);
    });

    qb.build().execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

/// Min and max instant in a batch; `None` for an empty batch.
fn batch_bounds(batch: &[NewReading]) -> Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> {
    // ---
    let first = batch.first()?;
    let mut t_min = first.timestamp;
    let mut t_max = first.timestamp;
    for r in batch {
        t_min = t_min.min(r.timestamp);
        t_max = t_max.max(r.timestamp);
    }
    Some((t_min, t_max))
}
