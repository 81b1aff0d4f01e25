//! `sqlx::PgPool` construction and schema bootstrap.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Creates the tables this service needs if they don't already exist.
/// A real deployment runs this through `sqlx::migrate!`; inlined here so
/// the service is runnable against a bare Postgres instance.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS t_exposed (
            key_data BYTEA NOT NULL,
            rolling_start BIGINT NOT NULL,
            rolling_period INT NOT NULL,
            transmission_risk_level INT NOT NULL,
            received_at BIGINT NOT NULL,
            origin TEXT,
            report_type INT,
            days_since_onset INT,
            country TEXT,
            PRIMARY KEY (key_data, rolling_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_t_exposed_received_at ON t_exposed (received_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS t_redeem (
            uuid UUID PRIMARY KEY,
            expiry BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS t_shedlock (
            name TEXT PRIMARY KEY,
            lock_until BIGINT NOT NULL,
            locked_at BIGINT NOT NULL,
            locked_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
