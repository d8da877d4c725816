//! Database utility functions.

use chrono::{Duration, Utc};

const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Datetime `hours` before now, in SQLite format.
pub fn timestamp_hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours))
        .format(SQLITE_TIMESTAMP)
        .to_string()
}
