//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds.
///
/// A clock set before the epoch reads as 0 rather than failing.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
