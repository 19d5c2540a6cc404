//! Time helpers
//!
//! Storage and sync state always use UTC millisecond timestamps (INTEGER).

use chrono::{TimeZone, Utc};

/// Current UTC time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// RFC 3339 rendering of a millisecond timestamp, for logs and UI summaries
pub fn format_millis(ts: i64) -> String {
    match Utc.timestamp_millis_opt(ts).single() {
        Some(dt) => dt.to_rfc3339(),
        None => ts.to_string(),
    }
}
