//! Key-format, batch-release-time and retention-window predicates.

use crate::model::Tek;
use crate::time::bucket_start;

pub fn is_valid_key_format(key: &Tek, key_size_bytes: usize) -> bool {
    key.key_data.len() == key_size_bytes
}

/// `now - retention <= since <= now` and `since` is bucket-aligned.
pub fn is_valid_batch_release_time(
    since: i64,
    now: i64,
    retention_ms: i64,
    bucket_ms: i64,
) -> bool {
    since >= now - retention_ms && since <= now && since == bucket_start(since, bucket_ms)
}

/// True iff the key's whole validity window lies in the past beyond
/// retention — i.e. it would be immediately pruned by the retention sweep.
pub fn is_before_retention(key: &Tek, now: i64, retention_ms: i64) -> bool {
    key.end_ms() < now - retention_ms
}

/// True iff the key's rolling start lies beyond `now + skew`.
pub fn is_in_future(key: &Tek, now: i64, skew_ms: i64) -> bool {
    key.start_ms() > now + skew_ms
}

pub fn is_valid_rolling_period(key: &Tek) -> bool {
    (1..=144).contains(&key.rolling_period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixture_key;

    #[test]
    fn key_format_checks_exact_length() {
        let k = fixture_key(1, 0);
        assert!(is_valid_key_format(&k, 16));
        assert!(!is_valid_key_format(&k, 32));
    }

    #[test]
    fn batch_release_time_requires_alignment_and_window() {
        let bucket = 7_200_000;
        let now = 10 * bucket;
        let retention = 14 * 86_400_000;
        assert!(is_valid_batch_release_time(9 * bucket, now, retention, bucket));
        // misaligned
        assert!(!is_valid_batch_release_time(9 * bucket + 1, now, retention, bucket));
        // future
        assert!(!is_valid_batch_release_time(now + bucket, now, retention, bucket));
        // before window
        assert!(!is_valid_batch_release_time(-retention - bucket, now, retention, bucket));
    }

    #[test]
    fn before_retention_flags_fully_expired_keys() {
        let retention = 14 * 86_400_000;
        let mut k = fixture_key(1, 0);
        k.rolling_period = 144;
        let now = retention + 2 * 86_400_000;
        assert!(is_before_retention(&k, now, retention));
        assert!(!is_before_retention(&k, 86_400_000, retention));
    }

    #[test]
    fn in_future_respects_skew() {
        let skew = 2 * 3_600_000;
        let mut k = fixture_key(1, 1000);
        k.rolling_period = 1;
        let now = k.start_ms() - 1;
        assert!(!is_in_future(&k, now, skew));
        let now_far_past = k.start_ms() - skew - 1;
        assert!(is_in_future(&k, now_far_past, skew));
    }

    #[test]
    fn rolling_period_bounds() {
        let mut k = fixture_key(1, 0);
        k.rolling_period = 0;
        assert!(!is_valid_rolling_period(&k));
        k.rolling_period = 1;
        assert!(is_valid_rolling_period(&k));
        k.rolling_period = 144;
        assert!(is_valid_rolling_period(&k));
        k.rolling_period = 145;
        assert!(!is_valid_rolling_period(&k));
    }
}
