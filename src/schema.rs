//! Database schema management for the motionstore engine.
//!
//! Ensures the partitioned readings table and its indexes exist before any
//! ingestion or query runs. Applied once on startup by the engine facade.

use sqlx::PgPool;

use crate::error::Result;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_data` parent table, range-partitioned on `timestamp`,
/// and the secondary indexes the query engine's scans are shaped for. Safe to
/// call on every startup; no-op if objects already exist. Individual month
/// partitions are managed separately by the partition module.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Parent table. The primary key must include the partition column, so
    // rows are keyed by (id, timestamp).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id               BIGSERIAL,
            timestamp        TIMESTAMPTZ  NOT NULL,
            device_type      VARCHAR(100) NOT NULL,
            device_mac       VARCHAR(50),

            accel_x          DOUBLE PRECISION,
            accel_y          DOUBLE PRECISION,
            accel_z          DOUBLE PRECISION,

            gyro_x           DOUBLE PRECISION,
            gyro_y           DOUBLE PRECISION,
            gyro_z           DOUBLE PRECISION,

            angle_x          DOUBLE PRECISION,
            angle_y          DOUBLE PRECISION,
            angle_z          DOUBLE PRECISION,

            mag_x            DOUBLE PRECISION,
            mag_y            DOUBLE PRECISION,
            mag_z            DOUBLE PRECISION,

            quaternion_0     DOUBLE PRECISION,
            quaternion_1     DOUBLE PRECISION,
            quaternion_2     DOUBLE PRECISION,
            quaternion_3     DOUBLE PRECISION,

            temperature      DOUBLE PRECISION,
            firmware_version VARCHAR(50),
            battery_level    INTEGER,

            created_at       TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,

            PRIMARY KEY (id, timestamp)
        ) PARTITION BY RANGE (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Indexes backing the three query shapes and the creation-time scan
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp
            ON sensor_data (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_device_type
            ON sensor_data (device_type);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_device_timestamp
            ON sensor_data (device_type, timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_data_created_at
            ON sensor_data (created_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
