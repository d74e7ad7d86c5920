// ============================================
// File: crates/luminous-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Token claims, certificate validity windows and RPC expiry fields are all
//! Unix seconds. These helpers keep that conversion in one place.
//!
//! ## Main Functionality
//! - `unix_now`: Current wall-clock time in Unix seconds
//! - `unix_after`: Wall-clock time a given duration from now
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session leases use `Instant` (monotonic), not these helpers
//! - A clock before 1970 yields 0 rather than an error
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Returns the Unix timestamp `duration` from now, saturating on overflow.
#[must_use]
pub fn unix_after(duration: Duration) -> i64 {
    let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
    unix_now().saturating_add(secs)
}
