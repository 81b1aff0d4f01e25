//! Persistent set of TEKs indexed by rolling-start and received-at.

use sqlx::PgPool;

use crate::error::AppError;
use crate::model::{ExposedRow, Tek};
use crate::time::bucket_start;

/// Storage seam for the exposed-key set. `ExposedStore` is the `sqlx`-backed
/// production implementation; `store::fake::InMemoryExposedStore` is a
/// drop-in fake used by tests so the idempotent-upload and
/// bucket-monotonicity properties can be exercised without a live Postgres
/// connection.
#[async_trait::async_trait]
pub trait ExposedRepository: Send + Sync {
    /// Inserts all keys atomically. `(key_data, rolling_start)` conflicts are
    /// silently ignored so a re-upload of the same key is idempotent.
    /// Returns the number of rows actually inserted.
    async fn upsert_exposed(
        &self,
        keys: &[Tek],
        received_at: i64,
        country: Option<&str>,
    ) -> Result<u64, AppError>;

    /// Rows with `since <= received_at < bucketStart(now)`, sorted by
    /// `key_data` ascending. The strict upper bound is essential: a row is
    /// publishable only after its release bucket fully closes.
    async fn get_sorted_exposed_since(
        &self,
        since: i64,
        now: i64,
        bucket_ms: i64,
        visited_countries: Option<&[String]>,
        origin_countries: Option<&[String]>,
    ) -> Result<Vec<ExposedRow>, AppError>;

    /// Deletes rows whose validity window ended before `now - retention`.
    async fn clean_db(&self, now: i64, retention_ms: i64) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct ExposedStore {
    pool: PgPool,
}

impl ExposedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl ExposedRepository for ExposedStore {
    async fn upsert_exposed(
        &self,
        keys: &[Tek],
        received_at: i64,
        country: Option<&str>,
    ) -> Result<u64, AppError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for k in keys {
            let result = sqlx::query(
                r#"
                INSERT INTO t_exposed
                    (key_data, rolling_start, rolling_period, transmission_risk_level,
                     received_at, origin, report_type, days_since_onset, country)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (key_data, rolling_start) DO NOTHING
                "#,
            )
            .bind(&k.key_data)
            .bind(k.rolling_start_number as i64)
            .bind(k.rolling_period as i32)
            .bind(k.transmission_risk_level)
            .bind(received_at)
            .bind(&k.origin)
            .bind(k.report_type)
            .bind(k.days_since_onset_of_symptoms)
            .bind(country)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
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
        let rows = sqlx::query_as::<_, ExposedRowRecord>(
            r#"
            SELECT key_data, rolling_start, rolling_period, transmission_risk_level,
                   received_at, origin, report_type, days_since_onset, country
            FROM t_exposed
            WHERE received_at >= $1 AND received_at < $2
              AND ($3::text[] IS NULL OR country = ANY($3))
              AND ($4::text[] IS NULL OR origin = ANY($4))
            ORDER BY key_data ASC
            "#,
        )
        .bind(since)
        .bind(upper)
        .bind(visited_countries.filter(|v| !v.is_empty()))
        .bind(origin_countries.filter(|v| !v.is_empty()))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ExposedRow::from).collect())
    }

    async fn clean_db(&self, now: i64, retention_ms: i64) -> Result<u64, AppError> {
        let cutoff = now - retention_ms;
        let result = sqlx::query(
            r#"
            DELETE FROM t_exposed
            WHERE rolling_start * 600000 + rolling_period * 600000 < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct ExposedRowRecord {
    key_data: Vec<u8>,
    rolling_start: i64,
    rolling_period: i32,
    transmission_risk_level: i32,
    received_at: i64,
    origin: Option<String>,
    report_type: Option<i32>,
    days_since_onset: Option<i32>,
    country: Option<String>,
}

impl From<ExposedRowRecord> for ExposedRow {
    fn from(r: ExposedRowRecord) -> Self {
        ExposedRow {
            tek: Tek {
                key_data: r.key_data,
                rolling_start_number: r.rolling_start as u32,
                rolling_period: r.rolling_period as u32,
                transmission_risk_level: r.transmission_risk_level,
                fake: 0,
                origin: r.origin,
                report_type: r.report_type,
                days_since_onset_of_symptoms: r.days_since_onset,
            },
            received_at: r.received_at,
            country: r.country,
        }
    }
}
