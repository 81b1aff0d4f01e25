//! Structured observability counters, in the teacher's style: one
//! `AtomicU64` per drop/accept reason, exposed as JSON on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct Metrics {
    pub uploads_accepted: AtomicU64,
    pub uploads_rejected: AtomicU64,
    pub keys_inserted: AtomicU64,
    pub keys_dropped_future: AtomicU64,
    pub keys_dropped_retention: AtomicU64,
    pub keys_dropped_fake: AtomicU64,
    pub keys_dropped_rolling_period: AtomicU64,
    pub auth_failures: AtomicU64,
    pub downloads_served: AtomicU64,
    pub downloads_empty: AtomicU64,
    pub downloads_rejected: AtomicU64,
    pub cleanup_runs: AtomicU64,
    pub keys_pruned: AtomicU64,
    pub fake_key_refreshes: AtomicU64,
    pub lease_contended: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_accepted: self.uploads_accepted.load(Ordering::Relaxed),
            uploads_rejected: self.uploads_rejected.load(Ordering::Relaxed),
            keys_inserted: self.keys_inserted.load(Ordering::Relaxed),
            keys_dropped_future: self.keys_dropped_future.load(Ordering::Relaxed),
            keys_dropped_retention: self.keys_dropped_retention.load(Ordering::Relaxed),
            keys_dropped_fake: self.keys_dropped_fake.load(Ordering::Relaxed),
            keys_dropped_rolling_period: self.keys_dropped_rolling_period.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            downloads_served: self.downloads_served.load(Ordering::Relaxed),
            downloads_empty: self.downloads_empty.load(Ordering::Relaxed),
            downloads_rejected: self.downloads_rejected.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            keys_pruned: self.keys_pruned.load(Ordering::Relaxed),
            fake_key_refreshes: self.fake_key_refreshes.load(Ordering::Relaxed),
            lease_contended: self.lease_contended.load(Ordering::Relaxed),
        }
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    uploads_accepted: u64,
    uploads_rejected: u64,
    keys_inserted: u64,
    keys_dropped_future: u64,
    keys_dropped_retention: u64,
    keys_dropped_fake: u64,
    keys_dropped_rolling_period: u64,
    auth_failures: u64,
    downloads_served: u64,
    downloads_empty: u64,
    downloads_rejected: u64,
    cleanup_runs: u64,
    keys_pruned: u64,
    fake_key_refreshes: u64,
    lease_contended: u64,
}
