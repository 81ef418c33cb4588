//! Data models for the motion sensor pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---

/// A parsed sensor sample, ready for insertion.
///
/// The timestamp and device type are always present; every other field is
/// optional because source lines may lack individual columns. `id` and
/// `created_at` do not exist yet; they are assigned by the server on commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub device_type: String,
    /// Colon-separated hex octets, upper-cased, e.g. `FE:D5:86:66:1D:7C`.
    pub device_mac: Option<String>,

    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,

    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,

    pub angle_x: Option<f64>,
    pub angle_y: Option<f64>,
    pub angle_z: Option<f64>,

    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,

    pub quaternion_0: Option<f64>,
    pub quaternion_1: Option<f64>,
    pub quaternion_2: Option<f64>,
    pub quaternion_3: Option<f64>,

    pub temperature: Option<f64>,
    pub firmware_version: Option<String>,
    /// Percentage, clamped into 0–100 under the default battery policy.
    pub battery_level: Option<i32>,
}

/// A stored sensor reading as returned by queries.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SensorReading {
    // ---
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub device_type: String,
    pub device_mac: Option<String>,

    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,

    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,

    pub angle_x: Option<f64>,
    pub angle_y: Option<f64>,
    pub angle_z: Option<f64>,

    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,

    pub quaternion_0: Option<f64>,
    pub quaternion_1: Option<f64>,
    pub quaternion_2: Option<f64>,
    pub quaternion_3: Option<f64>,

    pub temperature: Option<f64>,
    pub firmware_version: Option<String>,
    pub battery_level: Option<i32>,

    pub created_at: DateTime<Utc>,
}

/// Per-device summary statistics, computed on demand.
///
/// The channel extremes are only populated when the aggregation is asked to
/// include them; they cover the temperature and battery channels.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeviceStats {
    // ---
    pub record_count: i64,
    pub first_record: DateTime<Utc>,
    pub last_record: DateTime<Utc>,

    #[sqlx(default)]
    pub temperature_min: Option<f64>,
    #[sqlx(default)]
    pub temperature_max: Option<f64>,
    #[sqlx(default)]
    pub temperature_avg: Option<f64>,

    #[sqlx(default)]
    pub battery_min: Option<i32>,
    #[sqlx(default)]
    pub battery_max: Option<i32>,
    #[sqlx(default)]
    pub battery_avg: Option<f64>,
}
