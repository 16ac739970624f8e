//! Utility functions for Nation DAO hosts
//!
//! The governance core never reads the clock itself; these helpers are for the
//! host side that supplies time to it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::types::Timestamp;

/// Get the current wall-clock timestamp in seconds
pub fn timestamp_secs() -> Timestamp {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    since_epoch.as_secs()
}

/// Render a timestamp as RFC 3339, falling back to the raw number when out of range
pub fn format_timestamp(timestamp: Timestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}
