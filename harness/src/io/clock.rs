//! Wall-clock access. Core modules take timestamps as arguments instead.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC 3339 UTC string (second precision).
pub fn now() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compact stamp used as the prefix of artifact ids.
pub fn id_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}
