//! In-memory fake of `ExposedRepository`. Lets the idempotent-upload and
//! bucket-monotonicity properties be exercised without a live Postgres
//! connection.

use dashmap::DashMap;

use crate::error::AppError;
use crate::model::{ExposedRow, Tek};
use crate::time::bucket_start;

use super::exposed::ExposedRepository;

#[derive(Default)]
pub struct InMemoryExposedStore {
    rows: DashMap<(Vec<u8>, u32), ExposedRow>,
}

impl InMemoryExposedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ExposedRepository for InMemoryExposedStore {
    async fn upsert_exposed(
        &self,
        keys: &[Tek],
        received_at: i64,
        country: Option<&str>,
    ) -> Result<u64, AppError> {
        let mut inserted = 0u64;
        for k in keys {
            let pk = (k.key_data.clone(), k.rolling_start_number);
            if self.rows.contains_key(&pk) {
                continue;
            }
            self.rows.insert(
                pk,
                ExposedRow {
                    tek: k.clone(),
                    received_at,
                    country: country.map(str::to_string),
                },
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn get_sorted_exposed_since(
        &self,
        since: i64,
        now: i64,
        bucket_ms: i64,
        visited_countries: Option<&[String]>,
        origin_countries: Option<&[String]>,
    ) -> Result<Vec<ExposedRow>, AppError> {
        let upper = bucket_start(now, bucket_ms);
        let mut rows: Vec<ExposedRow> = self
            .rows
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| r.received_at >= since && r.received_at < upper)
            .filter(|r| matches(visited_countries, r.country.as_deref()))
            .filter(|r| matches(origin_countries, r.tek.origin.as_deref()))
            .collect();
        rows.sort_by(|a, b| a.tek.key_data.cmp(&b.tek.key_data));
        Ok(rows)
    }

    async fn clean_db(&self, now: i64, retention_ms: i64) -> Result<u64, AppError> {
        let cutoff = now - retention_ms;
        let before = self.rows.len();
        self.rows.retain(|_, row| row.tek.end_ms() >= cutoff);
        Ok((before - self.rows.len()) as u64)
    }
}

fn matches(filter: Option<&[String]>, value: Option<&str>) -> bool {
    match filter.filter(|v| !v.is_empty()) {
        None => true,
        Some(allowed) => value.map_or(false, |v| allowed.iter().any(|a| a == v)),
    }
}
