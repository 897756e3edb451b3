//! Wall-clock timestamp helpers.
//!
//! Kiosk records carry local time at second precision, written as
//! `YYYY-MM-DDTHH:MM:SS`.

use chrono::{Local, NaiveDateTime, SubsecRound};

/// Local wall-clock timestamp used across records.
pub type Timestamp = NaiveDateTime;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Returns the current local time truncated to whole seconds.
pub fn now_local() -> Timestamp {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS`.
pub fn format_timestamp(value: Timestamp) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Formats the date half of a timestamp.
pub fn format_date(value: Timestamp) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Formats the time half of a timestamp.
pub fn format_time(value: Timestamp) -> String {
    value.format(TIME_FORMAT).to_string()
}

/// Parses an ISO-8601 local timestamp, tolerating fractional seconds.
///
/// Fractions are dropped so reloaded values compare equal to what is
/// written back out.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<NaiveDateTime>()
        .ok()
        .map(|parsed| parsed.trunc_subsecs(0))
}
