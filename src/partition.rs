//! Partition lifecycle for the time-partitioned readings table.
//!
//! The readings table is range-partitioned on `timestamp` into month-aligned
//! windows, each named deterministically from its year and month. Partitions
//! are created lazily before any insert that touches them and proactively for
//! a configured span around the current month; they are never merged or
//! dropped here; retention is an external concern.

use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::error::Result;

// ---

/// A month-aligned partition window: `[first of month, first of next month)`.
///
/// Window math is pure integer arithmetic on `(year, month)`, so naming and
/// covering are deterministic and cheap to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthWindow {
    year: i32,
    /// 1–12, kept in range by construction.
    month: u32,
}

impl MonthWindow {
    /// The window containing the given instant (month boundaries in UTC).
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    /// Every window intersecting `[min, max]`, in ascending order.
    /// Empty when `max` precedes `min`.
    pub fn covering(min: DateTime<Utc>, max: DateTime<Utc>) -> Vec<Self> {
        // ---
        let last = Self::containing(max);
        let mut window = Self::containing(min);
        let mut windows = Vec::new();
        while window <= last {
            windows.push(window);
            window = window.shifted(1);
        }
        windows
    }

    /// The window `months` whole months away (negative shifts backwards).
    pub fn shifted(self, months: i32) -> Self {
        // ---
        let total = self.year * 12 + self.month as i32 - 1 + months;
        Self {
            year: total.div_euclid(12),
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// Deterministic partition name, e.g. `sensor_data_y2025m06`.
    pub fn partition_name(&self) -> String {
        format!("sensor_data_y{:04}m{:02}", self.year, self.month)
    }

    fn lower_bound(&self) -> String {
        format!("{:04}-{:02}-01 00:00:00+00", self.year, self.month)
    }

    fn upper_bound(&self) -> String {
        self.shifted(1).lower_bound()
    }
}

// ---

/// Create the partition for one window if it does not exist yet.
///
/// Safe to invoke concurrently: `IF NOT EXISTS` handles the common case, and
/// the duplicate-object race two writers can still lose is swallowed.
pub async fn ensure_partition(pool: &PgPool, window: MonthWindow) -> Result<()> {
    // ---
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF sensor_data \
         FOR VALUES FROM ('{from}') TO ('{to}')",
        name = window.partition_name(),
        from = window.lower_bound(),
        to = window.upper_bound(),
    );

    match sqlx::query(&ddl).execute(pool).await {
        Ok(_) => {
            debug!("partition {} ready", window.partition_name());
            Ok(())
        }
        Err(e) if is_duplicate_object(&e) => {
            debug!("partition {} created concurrently", window.partition_name());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Ensure a covering partition exists for every window intersecting
/// `[min, max]` before an insert touching that range executes.
pub async fn ensure_covering(pool: &PgPool, min: DateTime<Utc>, max: DateTime<Utc>) -> Result<()> {
    // ---
    for window in MonthWindow::covering(min, max) {
        ensure_partition(pool, window).await?;
    }
    Ok(())
}

/// Proactively materialize the retention span around `now`: `past` months
/// back through `future` months ahead. Windows outside this span are still
/// created on demand by [`ensure_covering`].
pub async fn ensure_default_window(
    pool: &PgPool,
    now: DateTime<Utc>,
    past: u32,
    future: u32,
) -> Result<()> {
    // ---
    let current = MonthWindow::containing(now);
    for offset in -(past as i32)..=(future as i32) {
        ensure_partition(pool, current.shifted(offset)).await?;
    }
    Ok(())
}

/// Two writers racing past `IF NOT EXISTS` surface as duplicate_table
/// (42P07) or as a unique violation on the catalog row (23505).
fn is_duplicate_object(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("42P07") | Some("23505"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn window_naming_is_deterministic() {
        // ---
        let w = MonthWindow::containing(utc(2025, 6, 5, 18));
        assert_eq!(w.partition_name(), "sensor_data_y2025m06");
        assert_eq!(w.lower_bound(), "2025-06-01 00:00:00+00");
        assert_eq!(w.upper_bound(), "2025-07-01 00:00:00+00");
    }

    #[test]
    fn shift_crosses_year_boundaries() {
        // ---
        let dec = MonthWindow::containing(utc(2025, 12, 15, 0));
        assert_eq!(dec.shifted(1).partition_name(), "sensor_data_y2026m01");
        assert_eq!(dec.shifted(2).partition_name(), "sensor_data_y2026m02");

        let jan = MonthWindow::containing(utc(2025, 1, 1, 0));
        assert_eq!(jan.shifted(-1).partition_name(), "sensor_data_y2024m12");
        assert_eq!(jan.shifted(-13).partition_name(), "sensor_data_y2023m12");
    }

    #[test]
    fn covering_spans_every_intersecting_month() {
        // ---
        let windows = MonthWindow::covering(utc(2025, 11, 20, 0), utc(2026, 2, 3, 0));
        let names: Vec<String> = windows.iter().map(|w| w.partition_name()).collect();
        assert_eq!(
            names,
            [
                "sensor_data_y2025m11",
                "sensor_data_y2025m12",
                "sensor_data_y2026m01",
                "sensor_data_y2026m02",
            ]
        );
    }

    #[test]
    fn covering_single_instant_is_one_window() {
        // ---
        let t = utc(2025, 6, 5, 18);
        assert_eq!(MonthWindow::covering(t, t).len(), 1);
    }

    #[test]
    fn covering_inverted_range_is_empty() {
        // ---
        let windows = MonthWindow::covering(utc(2025, 7, 1, 0), utc(2025, 6, 1, 0));
        assert!(windows.is_empty());
    }
}
