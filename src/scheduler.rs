//! Periodic cleanup and fake-key refresh, each guarded by a distributed
//! lease so at most one replica runs a given tick.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::fakekey::FakeKeyService;
use crate::metrics::Metrics;
use crate::store::exposed::ExposedRepository;
use crate::store::redeem::RedeemStore;
use crate::store::shedlock::LeaseStore;
use crate::time::Clock;

const CLEAN_DATA_LEASE: &str = "cleanData";
const UPDATE_FAKE_KEYS_LEASE: &str = "updateFakeKeys";
const CLEAN_DATA_HOLD_MS: i64 = 55 * 60_000; // under the hourly tick width
const UPDATE_FAKE_KEYS_HOLD_MS: i64 = 20 * 3_600_000; // under the 24h tick width

pub struct Scheduler {
    exposed: Arc<dyn ExposedRepository>,
    redeem: RedeemStore,
    fake_keys: Arc<FakeKeyService>,
    lease: LeaseStore,
    clock: Arc<dyn Clock>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    pub fn new(
        exposed: Arc<dyn ExposedRepository>,
        redeem: RedeemStore,
        fake_keys: Arc<FakeKeyService>,
        lease: LeaseStore,
        clock: Arc<dyn Clock>,
        config: Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            exposed,
            redeem,
            fake_keys,
            lease,
            clock,
            config,
            metrics,
        }
    }

    pub fn spawn(self: Arc<Self>) {
        let clean = self.clone();
        tokio::spawn(async move { clean.run_clean_data_loop().await });
        let fake = self.clone();
        tokio::spawn(async move { fake.run_update_fake_keys_loop().await });
    }

    async fn run_clean_data_loop(&self) {
        tokio::time::sleep(Duration::from_secs(60)).await; // 1-minute initial delay
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            self.tick_clean_data().await;
        }
    }

    async fn run_update_fake_keys_loop(&self) {
        loop {
            let sleep_for = seconds_until_next_0200_utc(self.clock.now_ms());
            tokio::time::sleep(Duration::from_secs(sleep_for)).await;
            self.tick_update_fake_keys().await;
        }
    }

    async fn tick_clean_data(&self) {
        let now = self.clock.now_ms();
        match self.lease.try_acquire(CLEAN_DATA_LEASE, now, CLEAN_DATA_HOLD_MS).await {
            Ok(true) => {
                let retention_ms = self.config.retention_ms();
                match self.exposed.clean_db(now, retention_ms).await {
                    Ok(pruned) => {
                        Metrics::inc(&self.metrics.cleanup_runs);
                        Metrics::add(&self.metrics.keys_pruned, pruned);
                        info!(pruned, "clean_data_complete");
                    }
                    Err(e) => warn!(error = %e, "clean_data_failed"),
                }
                if let Err(e) = self.redeem.clean_db(now).await {
                    warn!(error = %e, "redeem_cleanup_failed");
                }
                let _ = self.lease.release(CLEAN_DATA_LEASE, now).await;
            }
            Ok(false) => {
                Metrics::inc(&self.metrics.lease_contended);
            }
            Err(e) => warn!(error = %e, "lease_acquire_failed"),
        }
    }

    async fn tick_update_fake_keys(&self) {
        let now = self.clock.now_ms();
        match self
            .lease
            .try_acquire(UPDATE_FAKE_KEYS_LEASE, now, UPDATE_FAKE_KEYS_HOLD_MS)
            .await
        {
            Ok(true) => {
                self.fake_keys.refresh(now, self.config.retention_days);
                Metrics::inc(&self.metrics.fake_key_refreshes);
                info!("fake_keys_refreshed");
                let _ = self.lease.release(UPDATE_FAKE_KEYS_LEASE, now).await;
            }
            Ok(false) => {
                Metrics::inc(&self.metrics.lease_contended);
            }
            Err(e) => warn!(error = %e, "lease_acquire_failed"),
        }
    }
}

/// Seconds from `now_ms` until the next 02:00 UTC.
fn seconds_until_next_0200_utc(now_ms: i64) -> u64 {
    let target_hour_ms = 2 * 3_600_000;
    let day_start = crate::time::day_start(now_ms);
    let today_target = day_start + target_hour_ms;
    let next = if now_ms < today_target {
        today_target
    } else {
        today_target + 86_400_000
    };
    ((next - now_ms) / 1000).max(0) as u64
}
