//! Timestamp helpers.
//!
//! All database writes are RFC-3339 UTC strings with millisecond precision and a
//! `Z` suffix, so lexical order matches chronological order and SQL comparisons
//! on the text columns are safe.

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Current instant in the stored format.
pub fn now_rfc3339() -> String {
    to_rfc3339_millis(Utc::now())
}

/// Parse a stored timestamp column.
pub fn parse_stored(s: &str) -> Result<DateTime<Utc>, crate::error::SyncError> {
    parse_ts_to_utc(s).map_err(crate::error::SyncError::Other)
}

/// Milliseconds since the Unix epoch (Clover's timestamp format) -> UTC.
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
