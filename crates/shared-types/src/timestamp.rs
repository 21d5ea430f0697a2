//! # Timestamps
//!
//! Every timestamp written by the workspace uses [`TIMESTAMP_FORMAT`] in UTC,
//! e.g. `2026-10-16T09:30:00.000+0000`. The format is fixed width and zero
//! padded, so plain string comparison orders timestamps chronologically.
//! Expiry checks rely on that and compare strings, not dates.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// `YYYY-MM-DDTHH:mm:ss.sss±HHMM`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Length of a well formed timestamp.
pub const TIMESTAMP_LEN: usize = 28;

/// Used when an offset runs past what the fixed format can express.
pub const FAR_FUTURE: &str = "9999-12-31T23:59:59.999+0000";

/// Used when an offset runs before what the fixed format can express.
pub const FAR_PAST: &str = "0000-01-01T00:00:00.000+0000";

/// Format an instant.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// The current time.
#[must_use]
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// The time `offset` from now.
#[must_use]
pub fn timestamp_after(offset: Duration) -> String {
    chrono::Duration::from_std(offset)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .filter(|at| at.format("%Y").to_string().len() == 4)
        .map_or_else(|| FAR_FUTURE.to_string(), format_timestamp)
}

/// The time `offset` before now.
#[must_use]
pub fn timestamp_before(offset: Duration) -> String {
    chrono::Duration::from_std(offset)
        .ok()
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .filter(|at| at.format("%Y").to_string().len() == 4)
        .map_or_else(|| FAR_PAST.to_string(), format_timestamp)
}

/// True if `value` has the exact fixed-width layout.
#[must_use]
pub fn is_well_formed(value: &str) -> bool {
    value.len() == TIMESTAMP_LEN && DateTime::parse_from_str(value, TIMESTAMP_FORMAT).is_ok()
}
