//! Temporal conversions between epoch milliseconds, wire timestamps, and
//! ISO-8601 text.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NANOS_PER_MILLI: u32 = 1_000_000;
const MILLIS_PER_SECOND: i64 = 1_000;

/// Split an epoch-millisecond instant into wire `(seconds, nanos)`.
///
/// Uses Euclidean division so the nanosecond component stays in
/// `[0, 1_000_000_000)` even for pre-epoch (negative) instants.
pub fn split_epoch_millis(millis: i64) -> (i64, u32) {
    let seconds = millis.div_euclid(MILLIS_PER_SECOND);
    let sub_millis = millis.rem_euclid(MILLIS_PER_SECOND) as u32;
    (seconds, sub_millis * NANOS_PER_MILLI)
}

/// Join wire `(seconds, nanos)` back into an epoch-millisecond instant.
///
/// Sub-millisecond precision is truncated. Saturates at the i64 range
/// rather than wrapping on out-of-range inputs.
pub fn join_epoch_millis(seconds: i64, nanos: u32) -> i64 {
    seconds
        .saturating_mul(MILLIS_PER_SECOND)
        .saturating_add(i64::from(nanos / NANOS_PER_MILLI))
}

/// Parse temporal text into an epoch-millisecond instant.
///
/// The fallback order is pinned: text containing `'T'` or `'-'` is tried
/// as ISO-8601 (local date-time, then RFC 3339 with offset, then bare
/// date); anything else is tried as epoch-millisecond digits. Returns
/// `None` when no interpretation fits, in which case callers pass the
/// text through untouched.
pub fn parse_temporal_text(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('T') || trimmed.contains('-') {
        parse_iso_text(trimmed).map(|dt| dt.and_utc().timestamp_millis())
    } else {
        trimmed.parse::<i64>().ok()
    }
}

/// Parse temporal text into a naive UTC date-time, with the same pinned
/// fallback order as [`parse_temporal_text`].
pub fn parse_temporal_datetime(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('T') || trimmed.contains('-') {
        parse_iso_text(trimmed)
    } else {
        let millis = trimmed.parse::<i64>().ok()?;
        datetime_from_millis(millis)
    }
}

/// Convert an epoch-millisecond instant to a naive UTC date-time.
///
/// Returns `None` for instants outside the representable date range.
pub fn datetime_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

fn parse_iso_text(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}
