//! UTC time grid: release-bucket rounding and 10-minute interval conversion.

use std::time::{SystemTime, UNIX_EPOCH};

/// 10-minute interval, in milliseconds.
pub const TEN_MINUTES_MS: i64 = 600_000;

/// Capability for the current instant, so handlers and the scheduler take
/// time as an argument instead of calling `SystemTime::now()` directly.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }
}

/// Fixed clock for tests.
#[derive(Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Start of the bucket containing `t`, width `bucket_ms`.
pub fn bucket_start(t: i64, bucket_ms: i64) -> i64 {
    t.div_euclid(bucket_ms) * bucket_ms
}

/// Start of the bucket following the one containing `t`.
pub fn next_bucket(t: i64, bucket_ms: i64) -> i64 {
    bucket_start(t, bucket_ms) + bucket_ms
}

/// Convert ms-since-epoch to a count of 10-minute intervals, rounding toward
/// zero. Negative inputs are rejected — the GAEN rolling-start encoding has
/// no meaning before the epoch.
pub fn ms_to_interval(ms: i64) -> Option<u32> {
    if ms < 0 {
        return None;
    }
    Some((ms / TEN_MINUTES_MS) as u32)
}

/// Convert a 10-minute interval count back to ms-since-epoch.
pub fn interval_to_ms(interval: u32) -> i64 {
    (interval as i64) * TEN_MINUTES_MS
}

/// Start-of-UTC-day containing `t`.
pub fn day_start(t: i64) -> i64 {
    bucket_start(t, 86_400_000)
}
