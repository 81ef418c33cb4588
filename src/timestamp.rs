//! Timestamp normalization for raw sensor lines.
//!
//! Device logs carry wall-clock times in two literal shapes, with or without
//! a colon-delimited millisecond field, and with single- or double-digit
//! month/day/hour. Both shapes are naive; the instant is fixed by attaching
//! the process's configured local zone rather than silently assuming UTC.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};

// ---

/// Millisecond form, e.g. `2025-6-5 18:12:11:817`. Tried first.
const FORMAT_MILLIS: &str = "%Y-%m-%d %H:%M:%S:%3f";

/// Second-precision fallback, e.g. `2025-6-5 18:12:11`.
const FORMAT_SECONDS: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a raw timestamp literal into a timezone-aware instant.
///
/// Returns `None` when neither format matches, or when the wall time does
/// not exist in the local zone (spring-forward gap). An ambiguous wall time
/// (DST fold) resolves to the earlier instant.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, FORMAT_MILLIS)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, FORMAT_SECONDS))
        .ok()?;

    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
