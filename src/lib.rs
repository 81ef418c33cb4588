//! Ingestion-and-query engine for multi-device motion sensor readings.
//!
//! The engine turns delimited device-log files into rows of a
//! time-partitioned PostgreSQL table and serves filtered range queries and
//! per-device statistics back out. Parsing is tolerant by design: only a
//! missing timestamp or device type rejects a line, every other field
//! degrades to null, and a rejected line never aborts a run.
//!
//! Construct a [`SensorEngine`] from a [`Config`], then:
//! - [`SensorEngine::ingest_file`] / [`SensorEngine::ingest_lines`] to load
//!   data, receiving an [`IngestReport`] with per-reason skip tallies and
//!   per-batch commit outcomes;
//! - [`SensorEngine::query`] with a [`ReadingFilter`] (or the named
//!   recency / by-device / time-range shapes) to read ordered results;
//! - [`SensorEngine::device_statistics`] for per-device summaries.
//!
//! The presentation layer, process orchestration and retention policy are
//! collaborators, not part of this crate.

pub mod config;

mod device;
mod engine;
mod error;
mod ingest;
mod models;
mod parser;
mod partition;
mod query;
mod schema;
mod stats;
mod timestamp;

// These re-exports are the crate's public surface; the modules behind them
// stay private so callers depend on the boundary, not the layout.
pub use config::Config;
pub use device::{parse_device_label, DeviceIdentity};
pub use engine::SensorEngine;
pub use error::{EngineError, Result};
pub use ingest::{BatchOutcome, IngestReport, RejectCounts, WriteSummary};
pub use models::{DeviceStats, NewReading, SensorReading};
pub use parser::{
    parse_line, parse_lines, BatteryPolicy, LineRejection, ParsedLine, RejectReason,
    EXPECTED_COLUMNS,
};
pub use partition::MonthWindow;
pub use query::ReadingFilter;
pub use timestamp::parse_timestamp;
