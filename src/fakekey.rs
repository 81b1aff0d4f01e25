//! Synthetic-key generation, upsert, and daily refresh. Hides the true
//! diagnosis count from traffic analysis: the export always carries the
//! same padding regardless of how many real diagnoses occurred that day.

use dashmap::DashMap;
use rand::RngCore;

use crate::model::Tek;
use crate::time::day_start;

/// Independent in-memory store — retention sweeps on the real key store
/// never touch it, and real uploads never collide with it.
pub struct FakeKeyService {
    // day-start (ms) -> the N synthetic keys minted for that day
    by_day: DashMap<i64, Vec<Tek>>,
    amount_per_day: usize,
    origin: String,
    report_type: i32,
}

impl FakeKeyService {
    pub fn new(amount_per_day: usize, origin: String, report_type: i32) -> Self {
        Self {
            by_day: DashMap::new(),
            amount_per_day,
            origin,
            report_type,
        }
    }

    /// Ensures exactly `amount_per_day` synthetic TEKs exist for each of
    /// the past `retention_days` whole-day buckets, minting any missing
    /// days and trimming (or topping up) any day whose count drifted from
    /// a configuration change.
    pub fn refresh(&self, now_ms: i64, retention_days: i64) {
        for day in 0..retention_days {
            let day_ms = day_start(now_ms) - day * 86_400_000;
            self.by_day
                .entry(day_ms)
                .and_modify(|keys| self.reconcile(keys, day_ms))
                .or_insert_with(|| self.mint_day(day_ms));
        }
    }

    fn reconcile(&self, keys: &mut Vec<Tek>, day_ms: i64) {
        while keys.len() < self.amount_per_day {
            keys.push(self.mint_one(day_ms));
        }
        keys.truncate(self.amount_per_day);
    }

    fn mint_day(&self, day_ms: i64) -> Vec<Tek> {
        (0..self.amount_per_day).map(|_| self.mint_one(day_ms)).collect()
    }

    fn mint_one(&self, day_ms: i64) -> Tek {
        let mut key_data = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut key_data);
        Tek {
            key_data,
            rolling_start_number: (day_ms / crate::time::TEN_MINUTES_MS) as u32,
            rolling_period: 144,
            transmission_risk_level: 0,
            fake: 0, // cleared so it appears indistinguishable in exports
            origin: Some(self.origin.clone()),
            report_type: Some(self.report_type),
            days_since_onset_of_symptoms: None,
        }
    }

    /// All synthetic keys currently held, unioned with real keys at export
    /// time with no distinction.
    pub fn all_keys(&self) -> Vec<Tek> {
        self.by_day.iter().flat_map(|e| e.value().clone()).collect()
    }

    pub fn count_for_day(&self, day_ms: i64) -> usize {
        self.by_day.get(&day_ms).map(|v| v.len()).unwrap_or(0)
    }
}
