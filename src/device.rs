//! Device identity resolution.
//!
//! Sensor lines label their source as `TYPE(MAC)` or bare `TYPE`. The type is
//! mandatory; the parenthesized hardware address is optional and, when
//! malformed, is dropped rather than failing the line. Identity resolution
//! never blocks ingestion on a bad MAC, only on a missing type.

// ---

/// Canonical identity extracted from a device label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_type: String,
    /// Upper-cased `AA:BB:CC:DD:EE:FF`, absent when the label carried no
    /// address or the address failed validation.
    pub device_mac: Option<String>,
    /// The raw bracketed value when it failed MAC validation, kept so the
    /// caller can log the anomaly.
    pub malformed_mac: Option<String>,
}

/// Split a device label into its canonical identity.
///
/// Returns `None` only when no device type can be derived (empty label, or
/// nothing before the opening parenthesis).
pub fn parse_device_label(label: &str) -> Option<DeviceIdentity> {
    // ---
    let label = label.trim();

    let (type_part, mac_part) = match label.split_once('(') {
        Some((t, rest)) => {
            // Tolerate a missing closing parenthesis; the candidate is then
            // judged by MAC validation like any other bracketed value.
            let candidate = rest.strip_suffix(')').unwrap_or(rest);
            (t.trim(), Some(candidate.trim()))
        }
        None => (label, None),
    };

    if type_part.is_empty() {
        return None;
    }

    let (device_mac, malformed_mac) = match mac_part {
        Some(candidate) => {
            if let Some(mac) = normalize_mac(candidate) {
                (Some(mac), None)
            } else {
                (None, Some(candidate.to_string()))
            }
        }
        None => (None, None),
    };

    Some(DeviceIdentity {
        device_type: type_part.to_string(),
        device_mac,
        malformed_mac,
    })
}

/// Validate six colon-separated two-hex-digit groups, normalizing case.
fn normalize_mac(candidate: &str) -> Option<String> {
    // ---
    let groups: Vec<&str> = candidate.split(':').collect();
    if groups.len() != 6 {
        return None;
    }
    for group in &groups {
        if group.len() != 2 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
    }
    Some(candidate.to_ascii_uppercase())
}
