//! Distributed lease over `t_shedlock`, so that at most one replica runs a
//! given scheduled task per tick (ShedLock-style advisory lock on Postgres).

use sqlx::PgPool;

use crate::error::AppError;

#[derive(Clone)]
pub struct LeaseStore {
    pool: PgPool,
    owner: String,
}

impl LeaseStore {
    pub fn new(pool: PgPool, owner: impl Into<String>) -> Self {
        Self {
            pool,
            owner: owner.into(),
        }
    }

    /// Attempts to acquire (or extend, if already held by us) the named
    /// lease until `now + hold_ms`. Returns true if this replica now holds
    /// it.
    pub async fn try_acquire(&self, name: &str, now: i64, hold_ms: i64) -> Result<bool, AppError> {
        let lock_until = now + hold_ms;

        let inserted = sqlx::query(
            "INSERT INTO t_shedlock (name, lock_until, locked_at, locked_by)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(lock_until)
        .bind(now)
        .bind(&self.owner)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(true);
        }

        // Someone holds the row; take over only if their lease expired.
        let updated = sqlx::query(
            "UPDATE t_shedlock SET lock_until = $1, locked_at = $2, locked_by = $3
             WHERE name = $4 AND lock_until < $2",
        )
        .bind(lock_until)
        .bind(now)
        .bind(&self.owner)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    pub async fn release(&self, name: &str, now: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE t_shedlock SET lock_until = $1 WHERE name = $2 AND locked_by = $3")
            .bind(now)
            .bind(name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
