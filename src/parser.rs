//! Tab-delimited record parsing with tolerant format recovery.
//!
//! One input line holds one reading: timestamp, device label, sixteen motion
//! channels (acceleration, angular rate, angle, magnetic field, quaternion),
//! temperature, firmware version and battery level. Only the timestamp and
//! the device type are mandatory; every other column degrades to null when
//! empty or unparsable. A rejected line never aborts the sequence: the
//! parser attempts every remaining line and the caller tallies the outcome.

use crate::device;
use crate::models::NewReading;
use crate::timestamp;

// ---

/// Fixed input schema width. Column order: timestamp, device label,
/// accel x/y/z, gyro x/y/z, angle x/y/z, mag x/y/z, quaternion 0–3,
/// temperature, firmware version, battery level.
pub const EXPECTED_COLUMNS: usize = 21;

/// Battery percentage bounds declared by the device protocol.
const BATTERY_RANGE: std::ops::RangeInclusive<i32> = 0..=100;

/// How out-of-range battery values are handled.
///
/// Device firmware emits transient bad samples, so the default keeps the
/// line, clamps the value into range and flags it for downstream awareness.
/// `Strict` rejects the line instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryPolicy {
    ClampAndFlag,
    Strict,
}

/// Why a line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongColumnCount { found: usize },
    BadTimestamp,
    BadDeviceLabel,
    BadNumericField,
}

impl RejectReason {
    /// Stable label used for report grouping and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::WrongColumnCount { .. } => "wrong-column-count",
            RejectReason::BadTimestamp => "bad-timestamp",
            RejectReason::BadDeviceLabel => "bad-device-label",
            RejectReason::BadNumericField => "bad-numeric-field",
        }
    }
}

/// A skipped line with enough context to log and tally it.
#[derive(Debug, Clone)]
pub struct LineRejection {
    /// 1-based physical line number.
    pub line_number: usize,
    pub reason: RejectReason,
    /// The original line, kept verbatim for the rejection log.
    pub line: String,
}

/// A successfully parsed line plus its permissive-policy flags.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub reading: NewReading,
    /// Battery value was outside 0–100 and clamped.
    pub battery_clamped: bool,
    /// The bracketed device address failed MAC validation and was dropped.
    pub malformed_mac: Option<String>,
}

// ---

/// Parse one raw line into a validated reading.
pub fn parse_line(line: &str, policy: BatteryPolicy) -> Result<ParsedLine, RejectReason> {
    // ---
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() != EXPECTED_COLUMNS {
        // Reject on shape alone, without reading further columns.
        return Err(RejectReason::WrongColumnCount { found: cols.len() });
    }

    let timestamp = timestamp::parse_timestamp(cols[0]).ok_or(RejectReason::BadTimestamp)?;
    let identity = device::parse_device_label(cols[1]).ok_or(RejectReason::BadDeviceLabel)?;

    let mut battery_clamped = false;
    let battery_level = match opt_i32(cols[20]) {
        Some(v) if !BATTERY_RANGE.contains(&v) => match policy {
            BatteryPolicy::Strict => return Err(RejectReason::BadNumericField),
            BatteryPolicy::ClampAndFlag => {
                battery_clamped = true;
                Some(v.clamp(*BATTERY_RANGE.start(), *BATTERY_RANGE.end()))
            }
        },
        other => other,
    };

    let reading = NewReading {
        timestamp,
        device_type: identity.device_type,
        device_mac: identity.device_mac,
        accel_x: opt_f64(cols[2]),
        accel_y: opt_f64(cols[3]),
        accel_z: opt_f64(cols[4]),
        gyro_x: opt_f64(cols[5]),
        gyro_y: opt_f64(cols[6]),
        gyro_z: opt_f64(cols[7]),
        angle_x: opt_f64(cols[8]),
        angle_y: opt_f64(cols[9]),
        angle_z: opt_f64(cols[10]),
        mag_x: opt_f64(cols[11]),
        mag_y: opt_f64(cols[12]),
        mag_z: opt_f64(cols[13]),
        quaternion_0: opt_f64(cols[14]),
        quaternion_1: opt_f64(cols[15]),
        quaternion_2: opt_f64(cols[16]),
        quaternion_3: opt_f64(cols[17]),
        temperature: opt_f64(cols[18]),
        firmware_version: opt_string(cols[19]),
        battery_level,
    };

    Ok(ParsedLine {
        reading,
        battery_clamped,
        malformed_mac: identity.malformed_mac,
    })
}

/// Lazily parse a sequence of lines.
///
/// Whitespace-only lines are not data and are skipped without a rejection.
/// Line numbers are 1-based and count every physical line, skipped or not.
pub fn parse_lines<I>(
    lines: I,
    policy: BatteryPolicy,
) -> impl Iterator<Item = Result<ParsedLine, LineRejection>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    // ---
    lines
        .into_iter()
        .enumerate()
        .filter(|(_, line)| !line.as_ref().trim().is_empty())
        .map(move |(idx, line)| {
            let line = line.as_ref();
            parse_line(line, policy).map_err(|reason| LineRejection {
                line_number: idx + 1,
                reason,
                line: line.to_string(),
            })
        })
}

// ---

/// Per-field tolerant numeric parse: empty or non-numeric tokens are null.
fn opt_f64(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

fn opt_i32(token: &str) -> Option<i32> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

fn opt_string(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn valid_cols() -> Vec<String> {
        // ---
        [
            "2025-6-5 18:12:11:817",
            "WTSDCL(FE:D5:86:66:1D:7C)",
            "0.01",
            "-0.02",
            "0.98",
            "1.2",
            "-0.5",
            "0.1",
            "10.0",
            "20.0",
            "30.0",
            "1.0",
            "2.0",
            "3.0",
            "0.5",
            "0.5",
            "0.5",
            "0.5",
            "25.3",
            "v1.0",
            "87",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn join(cols: &[String]) -> String {
        cols.join("\t")
    }

    #[test]
    fn parses_full_scenario_line() {
        // ---
        let parsed = parse_line(&join(&valid_cols()), BatteryPolicy::ClampAndFlag).unwrap();
        let r = &parsed.reading;

        assert_eq!(r.device_type, "WTSDCL");
        assert_eq!(r.device_mac.as_deref(), Some("FE:D5:86:66:1D:7C"));
        assert_eq!(
            r.timestamp,
            crate::timestamp::parse_timestamp("2025-6-5 18:12:11:817").unwrap()
        );
        assert_eq!(r.accel_x, Some(0.01));
        assert_eq!(r.accel_y, Some(-0.02));
        assert_eq!(r.accel_z, Some(0.98));
        assert_eq!(r.temperature, Some(25.3));
        assert_eq!(r.firmware_version.as_deref(), Some("v1.0"));
        assert_eq!(r.battery_level, Some(87));
        assert!(!parsed.battery_clamped);
        assert!(parsed.malformed_mac.is_none());
    }

    #[test]
    fn rejects_wrong_column_count_without_reading_columns() {
        // ---
        let mut cols = valid_cols();
        cols.pop();
        let err = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap_err();
        assert_eq!(
            err,
            RejectReason::WrongColumnCount {
                found: EXPECTED_COLUMNS - 1
            }
        );

        // Too many columns rejects too, even when the extras are valid data.
        let mut cols = valid_cols();
        cols.push("1.0".to_string());
        let err = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap_err();
        assert_eq!(
            err,
            RejectReason::WrongColumnCount {
                found: EXPECTED_COLUMNS + 1
            }
        );
    }

    #[test]
    fn empty_or_garbage_channels_become_null() {
        // ---
        let mut cols = valid_cols();
        cols[2] = String::new(); // accel_x
        cols[7] = "not-a-number".to_string(); // gyro_z
        cols[18] = " ".to_string(); // temperature
        cols[19] = String::new(); // firmware
        cols[20] = "n/a".to_string(); // battery

        let parsed = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap();
        let r = &parsed.reading;
        assert_eq!(r.accel_x, None);
        assert_eq!(r.gyro_z, None);
        assert_eq!(r.temperature, None);
        assert_eq!(r.firmware_version, None);
        assert_eq!(r.battery_level, None);
        // Mandatory fields still present.
        assert_eq!(r.device_type, "WTSDCL");
    }

    #[test]
    fn bad_timestamp_rejects_line() {
        // ---
        let mut cols = valid_cols();
        cols[0] = "yesterday".to_string();
        let err = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap_err();
        assert_eq!(err, RejectReason::BadTimestamp);
    }

    #[test]
    fn bad_device_label_rejects_line() {
        // ---
        let mut cols = valid_cols();
        cols[1] = "(FE:D5:86:66:1D:7C)".to_string();
        let err = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap_err();
        assert_eq!(err, RejectReason::BadDeviceLabel);
    }

    #[test]
    fn malformed_mac_is_an_anomaly_not_a_rejection() {
        // ---
        let mut cols = valid_cols();
        cols[1] = "WTSDCL(FE:D5:86)".to_string();
        let parsed = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap();
        assert_eq!(parsed.reading.device_type, "WTSDCL");
        assert_eq!(parsed.reading.device_mac, None);
        assert_eq!(parsed.malformed_mac.as_deref(), Some("FE:D5:86"));
    }

    #[test]
    fn battery_clamp_policy_flags_out_of_range() {
        // ---
        let mut cols = valid_cols();
        cols[20] = "150".to_string();
        let parsed = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap();
        assert_eq!(parsed.reading.battery_level, Some(100));
        assert!(parsed.battery_clamped);

        let mut cols = valid_cols();
        cols[20] = "-5".to_string();
        let parsed = parse_line(&join(&cols), BatteryPolicy::ClampAndFlag).unwrap();
        assert_eq!(parsed.reading.battery_level, Some(0));
        assert!(parsed.battery_clamped);
    }

    #[test]
    fn battery_strict_policy_rejects_out_of_range() {
        // ---
        let mut cols = valid_cols();
        cols[20] = "150".to_string();
        let err = parse_line(&join(&cols), BatteryPolicy::Strict).unwrap_err();
        assert_eq!(err, RejectReason::BadNumericField);

        // In-range values pass unchanged under strict.
        let parsed = parse_line(&join(&valid_cols()), BatteryPolicy::Strict).unwrap();
        assert_eq!(parsed.reading.battery_level, Some(87));
    }

    #[test]
    fn header_line_is_rejected_not_fatal() {
        // ---
        // A header row has the right width but no parsable timestamp.
        let header = vec!["时间".to_string(); EXPECTED_COLUMNS];
        let err = parse_line(&join(&header), BatteryPolicy::ClampAndFlag).unwrap_err();
        assert_eq!(err, RejectReason::BadTimestamp);
    }

    #[test]
    fn rejection_never_aborts_the_sequence() {
        // ---
        let lines = vec![
            join(&valid_cols()),
            "short\tline".to_string(),
            String::new(),
            join(&valid_cols()),
        ];

        let outcomes: Vec<_> = parse_lines(lines, BatteryPolicy::ClampAndFlag).collect();
        assert_eq!(outcomes.len(), 3); // blank line skipped entirely

        assert!(outcomes[0].is_ok());
        let rejection = outcomes[1].as_ref().unwrap_err();
        assert_eq!(rejection.line_number, 2);
        assert_eq!(rejection.reason, RejectReason::WrongColumnCount { found: 2 });
        assert_eq!(rejection.line, "short\tline");
        assert!(outcomes[2].is_ok());
        // Line numbers count physical lines, including the skipped blank.
        assert_eq!(outcomes[2].as_ref().unwrap().reading.device_type, "WTSDCL");
    }
}
