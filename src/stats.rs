//! Per-device summary statistics.
//!
//! One GROUP BY pass computes every requested aggregate, never a scan per
//! channel. Devices with zero stored readings simply do not appear in the
//! result, they are not zero-filled.

use std::collections::BTreeMap;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::Result;
use crate::models::DeviceStats;

// ---

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    device_type: String,
    #[sqlx(flatten)]
    stats: DeviceStats,
}

/// Compute per-device statistics, optionally restricted to a set of device
/// types and optionally extended with the temperature and battery extremes.
pub async fn device_statistics(
    pool: &PgPool,
    devices: Option<&[String]>,
    include_channels: bool,
) -> Result<BTreeMap<String, DeviceStats>> {
    // ---
    let mut qb = build_stats(devices, include_channels);
    let rows: Vec<StatsRow> = qb.build_query_as().fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.device_type, row.stats))
        .collect())
}

fn build_stats(
    devices: Option<&[String]>,
    include_channels: bool,
) -> QueryBuilder<'static, Postgres> {
    // ---
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT device_type, \
         COUNT(*) AS record_count, \
         MIN(timestamp) AS first_record, \
         MAX(timestamp) AS last_record",
    );

    if include_channels {
        // AVG over integers yields numeric; cast back to a float column
        qb.push(
            ", MIN(temperature) AS temperature_min, \
             MAX(temperature) AS temperature_max, \
             AVG(temperature) AS temperature_avg, \
             MIN(battery_level) AS battery_min, \
             MAX(battery_level) AS battery_max, \
             AVG(battery_level)::DOUBLE PRECISION AS battery_avg",
        );
    }

    qb.push(" FROM sensor_data");
    if let Some(devices) = devices {
        qb.push(" WHERE device_type = ANY(")
            .push_bind(devices.to_vec())
            .push(")");
    }
    qb.push(" GROUP BY device_type");

    qb
}
