// =============================================================================
// GAEN exposure-notification key server — V2-UMA cuckoo-filter export
// =============================================================================
// Covers: key intake pipeline, batch-release protocol, export bundle
// assembly (protobuf + ECDSA signature, zipped; cuckoo filter for V2-UMA),
// fake-key padding, and scheduled retention/refresh under a distributed
// lease.
// =============================================================================

pub mod auth;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod export;
pub mod fakekey;
pub mod insert;
pub mod metrics;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod upload;
pub mod validation;
pub mod vault;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use auth::AuthAdapter;
use config::Config;
use fakekey::FakeKeyService;
use insert::manager::InsertManager;
use metrics::Metrics;
use store::exposed::ExposedRepository;
use time::Clock;
use vault::KeyVault;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub exposed_store: Arc<dyn ExposedRepository>,
    pub db_pool: PgPool,
    pub fake_key_service: Arc<FakeKeyService>,
    pub insert_manager: Arc<InsertManager>,
    pub auth: Arc<dyn AuthAdapter>,
    pub vault: Arc<KeyVault>,
    pub metrics: Arc<Metrics>,
}

async fn hello() -> &'static str {
    "Hello, GAEN"
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Json<metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub fn load_keys(vault: &mut KeyVault) {
    for (name, env_key) in [
        ("gaen", "GAEN_SIGNING_KEY_PEM"),
        ("next_day_jwt", "NEXT_DAY_JWT_KEY_PEM"),
        ("hash_filter", "HASH_FILTER_KEY_PEM"),
    ] {
        match std::env::var(env_key) {
            Ok(pem) => vault
                .load_pem(name, &pem)
                .unwrap_or_else(|e| panic!("failed to load {name} key: {e}")),
            Err(_) => tracing::warn!(key = name, "no PEM configured, signing with this key will fail"),
        }
    }
}

/// Builds the scope-keyed JWT verification registry: `"exposed"` tokens are
/// issued externally against `GAEN_JWT_PUBLIC_KEY_PEM`; `"exposed-next-day"`
/// tokens are self-issued, verified against the vault's own `next_day_jwt`
/// keypair's public half.
pub fn build_jwt_decoding_keys(vault: &KeyVault) -> std::collections::HashMap<String, jsonwebtoken::DecodingKey> {
    let mut keys = std::collections::HashMap::new();

    if let Ok(pem) = std::env::var("GAEN_JWT_PUBLIC_KEY_PEM") {
        match jsonwebtoken::DecodingKey::from_ec_pem(pem.as_bytes()) {
            Ok(k) => {
                keys.insert("exposed".to_string(), k);
            }
            Err(e) => tracing::warn!(error = %e, "failed to parse GAEN_JWT_PUBLIC_KEY_PEM"),
        }
    } else {
        tracing::warn!("GAEN_JWT_PUBLIC_KEY_PEM not configured, \"exposed\" uploads will fail auth");
    }

    match vault.get("next_day_jwt") {
        Ok(keypair) => match jsonwebtoken::DecodingKey::from_ec_pem(keypair.public_key_pem.as_bytes()) {
            Ok(k) => {
                keys.insert("exposed-next-day".to_string(), k);
            }
            Err(e) => tracing::warn!(error = %e, "failed to derive exposed-next-day verification key"),
        },
        Err(e) => tracing::warn!(error = %e, "next_day_jwt key not loaded, delayed-key uploads will fail auth"),
    }

    keys
}

pub fn router(state: AppState) -> Router {
    let request_timeout_ms = state.config.request_timeout_ms;
    Router::new()
        .route("/v1/gaen", get(hello))
        .route("/v2/gaen", get(hello))
        .route("/v2UMA/gaen", get(hello))
        .route("/v1/gaen/exposed", post(upload::upload_v1))
        .route("/v1/gaen/exposednextday", post(upload::upload_v1_next_day))
        .route("/v2/gaen/exposed", post(upload::upload_v2))
        .route("/v2UMA/gaen/exposed", post(upload::upload_v2_uma))
        .route("/v1/gaen/exposed/:batch_release_time", get(download::download_v1))
        .route("/v2/gaen/exposed", get(download::download_v2))
        .route("/v2UMA/gaen/exposed", get(download::download_v2_uma))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(std::time::Duration::from_millis(
                    request_timeout_ms,
                ))),
        )
}
