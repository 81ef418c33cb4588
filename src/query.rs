//! Index-aware range queries over stored readings.
//!
//! Filter criteria compose conjunctively: any subset of device type and
//! inclusive-start/exclusive-end instants, plus a mandatory positive limit.
//! The generated SQL places the device predicate first so that the compound
//! `(device_type, timestamp)` index satisfies combined scans, falling back
//! to the single-column indexes otherwise. The limit is enforced
//! server-side, and ordering is always deterministic: readings that tie on
//! instant are ordered by id in the same direction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::Result;
use crate::models::SensorReading;

// ---

const SELECT_READINGS: &str = "SELECT id, timestamp, device_type, device_mac, \
     accel_x, accel_y, accel_z, \
     gyro_x, gyro_y, gyro_z, \
     angle_x, angle_y, angle_z, \
     mag_x, mag_y, mag_z, \
     quaternion_0, quaternion_1, quaternion_2, quaternion_3, \
     temperature, firmware_version, battery_level, created_at \
     FROM sensor_data";

/// Filter criteria for a readings query.
///
/// Construct with one of the named shapes and refine with the builder
/// methods; all filters are optional except the limit.
///
/// A full time range scans ascending (oldest first); every other shape is a
/// recency scan, descending (newest first).
#[derive(Debug, Clone)]
pub struct ReadingFilter {
    pub device_type: Option<String>,
    /// Inclusive lower bound on the instant.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the instant.
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl ReadingFilter {
    /// Most recent readings across all devices, newest first.
    pub fn recent(limit: u32) -> Self {
        Self {
            device_type: None,
            start: None,
            end: None,
            limit,
        }
    }

    /// Most recent readings for one device, newest first.
    pub fn by_device(device_type: impl Into<String>, limit: u32) -> Self {
        Self {
            device_type: Some(device_type.into()),
            ..Self::recent(limit)
        }
    }

    /// Readings with `start <= instant < end`, oldest first.
    pub fn time_range(start: DateTime<Utc>, end: DateTime<Utc>, limit: u32) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::recent(limit)
        }
    }

    /// Restrict to one device type.
    pub fn device(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    /// Restrict to instants at or after `start`.
    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Restrict to instants strictly before `end`.
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Validate the filter and resolve the server-side limit under `cap`.
    /// Rejected filters never reach storage.
    fn validate(&self, cap: u32) -> Result<u32> {
        // ---
        if self.limit == 0 {
            return Err(crate::error::EngineError::invalid_filter(
                "limit must be positive",
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(crate::error::EngineError::invalid_filter(
                    "start must precede end",
                ));
            }
        }
        if cap > 0 {
            Ok(self.limit.min(cap))
        } else {
            Ok(self.limit)
        }
    }

    fn ascending(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

// ---

/// Execute a filtered range scan, returning an ordered (possibly empty)
/// result set.
pub async fn fetch_readings(
    pool: &PgPool,
    filter: &ReadingFilter,
    cap: u32,
) -> Result<Vec<SensorReading>> {
    // ---
    let limit = filter.validate(cap)?;
    let mut qb = build_select(filter, limit);
    let rows = qb
        .build_query_as::<SensorReading>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Assemble the scan for a validated filter. Predicate order matches the
/// compound `(device_type, timestamp)` index prefix.
fn build_select(filter: &ReadingFilter, limit: u32) -> QueryBuilder<'_, Postgres> {
    // ---
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_READINGS);

    let mut sep = " WHERE ";
    if let Some(device_type) = &filter.device_type {
        qb.push(sep).push("device_type = ").push_bind(device_type);
        sep = " AND ";
    }
    if let Some(start) = filter.start {
        qb.push(sep).push("timestamp >= ").push_bind(start);
        sep = " AND ";
    }
    if let Some(end) = filter.end {
        qb.push(sep).push("timestamp < ").push_bind(end);
    }

    if filter.ascending() {
        qb.push(" ORDER BY timestamp ASC, id ASC");
    } else {
        qb.push(" ORDER BY timestamp DESC, id DESC");
    }
    qb.push(" LIMIT ").push_bind(i64::from(limit));

    qb
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::EngineError;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 5, h, 0, 0).unwrap()
    }

    #[test]
    fn zero_limit_is_rejected_before_storage() {
        // ---
        let err = ReadingFilter::recent(0).validate(1000).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn inverted_or_empty_range_is_rejected() {
        // ---
        assert!(ReadingFilter::time_range(t(10), t(9), 5).validate(1000).is_err());
        assert!(ReadingFilter::time_range(t(10), t(10), 5).validate(1000).is_err());
        assert!(ReadingFilter::time_range(t(9), t(10), 5).validate(1000).is_ok());
    }

    #[test]
    fn limit_is_capped_server_side() {
        // ---
        assert_eq!(ReadingFilter::recent(50).validate(1000).unwrap(), 50);
        assert_eq!(ReadingFilter::recent(5000).validate(1000).unwrap(), 1000);
    }

    #[test]
    fn recency_scan_orders_descending_with_id_tiebreak() {
        // ---
        let filter = ReadingFilter::recent(10);
        let qb = build_select(&filter, 10);
        let sql = qb.sql();
        assert!(!sql.contains("WHERE"), "unexpected predicate: {sql}");
        assert!(sql.contains(" ORDER BY timestamp DESC, id DESC"));
        assert!(sql.ends_with(" LIMIT $1"));
    }

    #[test]
    fn device_scan_leads_with_the_index_prefix() {
        // ---
        let filter = ReadingFilter::by_device("WTSDCL", 10);
        let qb = build_select(&filter, 10);
        let sql = qb.sql();
        assert!(sql.contains(" WHERE device_type = $1"));
        assert!(sql.contains(" ORDER BY timestamp DESC, id DESC"));
        assert!(sql.ends_with(" LIMIT $2"));
    }

    #[test]
    fn full_range_scan_orders_ascending() {
        // ---
        let filter = ReadingFilter::time_range(t(9), t(10), 10);
        let qb = build_select(&filter, 10);
        let sql = qb.sql();
        assert!(sql.contains(" WHERE timestamp >= $1 AND timestamp < $2"));
        assert!(sql.contains(" ORDER BY timestamp ASC, id ASC"));
        assert!(sql.ends_with(" LIMIT $3"));
    }

    #[test]
    fn combined_filter_uses_compound_index_order() {
        // ---
        let filter = ReadingFilter::time_range(t(9), t(10), 10).device("WTSDCL");
        let qb = build_select(&filter, 10);
        let sql = qb.sql();
        assert!(sql
            .contains(" WHERE device_type = $1 AND timestamp >= $2 AND timestamp < $3"));
        assert!(sql.contains(" ORDER BY timestamp ASC, id ASC"));
    }

    #[test]
    fn half_open_start_only_is_a_recency_scan() {
        // ---
        let filter = ReadingFilter::recent(10).since(t(9));
        let qb = build_select(&filter, 10);
        let sql = qb.sql();
        assert!(sql.contains(" WHERE timestamp >= $1"));
        assert!(sql.contains(" ORDER BY timestamp DESC, id DESC"));
    }
}
