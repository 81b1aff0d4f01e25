//! Single-use upload-token nonces with TTL. Bounds replay of upload tokens.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Clone)]
pub struct RedeemStore {
    pool: PgPool,
}

impl RedeemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns true if `uuid` was previously unseen (and is now recorded).
    pub async fn insert(&self, uuid: Uuid, expiry: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO t_redeem (uuid, expiry) VALUES ($1, $2) ON CONFLICT (uuid) DO NOTHING",
        )
        .bind(uuid)
        .bind(expiry)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn clean_db(&self, now: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM t_redeem WHERE expiry < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
