//! Authn, request validation, and dispatch into the insert manager for the
//! four upload endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use jsonwebtoken::EncodingKey;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration, Instant};

use crate::auth::{encode_claims, Claims};
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::model::Tek;
use crate::AppState;

#[derive(Deserialize)]
pub struct V1UploadRequest {
    #[serde(rename = "temporaryExposureKeys")]
    pub keys: Vec<Tek>,
    #[serde(rename = "delayedKeyDate")]
    pub delayed_key_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct V2UploadRequest {
    #[serde(rename = "temporaryExposureKeys")]
    pub keys: Vec<Tek>,
}

#[derive(Deserialize)]
pub struct NextDayUploadRequest {
    #[serde(rename = "temporaryExposureKey")]
    pub key: Tek,
}

#[derive(Serialize)]
struct NextDayJwtResponse {
    token: String,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthFailure("missing Authorization header".into()))
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Sleeps until `arrival + request_time` has elapsed, flattening observable
/// timing across accept/reject paths. A no-op if the deadline already
/// passed (e.g. the database round trip alone took longer).
async fn time_level(arrival: Instant, request_time_ms: i64) {
    let deadline = arrival + Duration::from_millis(request_time_ms.max(0) as u64);
    let now = Instant::now();
    if deadline > now {
        sleep(deadline - now).await;
    }
}

/// Issues the `"exposed-next-day"` token handed back from a completed
/// `exposed` upload. `onset` carries the permitted delayed-key date rather
/// than a symptom-onset date; `fake` carries over from the original upload
/// so `/v1/gaen/exposednextday` can re-apply the same fake-consistency
/// check on the follow-up submission.
fn issue_next_day_jwt(
    state: &AppState,
    key_date: NaiveDate,
    original: &Claims,
    now_ms: i64,
) -> Result<String, AppError> {
    let keypair = state.vault.get("next_day_jwt")?;
    let encoding_key = EncodingKey::from_ec_pem(keypair.pkcs8_pem.as_bytes())
        .map_err(|e| AppError::Signing(format!("bad next-day signing key: {e}")))?;
    let now_s = now_ms / 1000;
    let claims = Claims {
        scope: "exposed-next-day".into(),
        onset: key_date,
        fake: original.fake,
        iat: now_s,
        exp: now_s + 172_800, // two days, generous enough for the "following day" upload
    };
    encode_claims(&claims, &encoding_key)
}

pub async fn upload_v1(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<V1UploadRequest>,
) -> Result<Response, AppError> {
    let arrival = Instant::now();
    let now_ms = state.clock.now_ms();

    let result = async {
        let token = bearer_token(&headers)?;
        let claims = state.auth.decode(token, "exposed", now_ms)?;
        state.auth.validate(&claims, "exposed")?;

        let ua = user_agent(&headers).to_string();
        let inserted = state
            .insert_manager
            .insert_into_database(body.keys, &ua, &claims, &state.config, now_ms)
            .await?;
        Metrics::add(&state.metrics.keys_inserted, inserted);

        match body.delayed_key_date {
            Some(date) => {
                let token = issue_next_day_jwt(&state, date, &claims, now_ms)?;
                Ok(Json(NextDayJwtResponse { token }).into_response())
            }
            None => Ok(StatusCode::OK.into_response()),
        }
    }
    .await;

    match &result {
        Ok(_) => Metrics::inc(&state.metrics.uploads_accepted),
        Err(_) => Metrics::inc(&state.metrics.uploads_rejected),
    }

    if result.is_ok() {
        time_level(arrival, state.config.request_time_ms).await;
    }
    result
}

pub async fn upload_v1_next_day(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NextDayUploadRequest>,
) -> Result<Response, AppError> {
    let arrival = Instant::now();
    let now_ms = state.clock.now_ms();

    let result = async {
        let token = bearer_token(&headers)?;
        let claims = state.auth.decode(token, "exposed-next-day", now_ms)?;
        state.auth.validate(&claims, "exposed-next-day")?;

        let key_date = key_rolling_start_date(&body.key)?;
        if key_date != claims.onset {
            return Err(AppError::InvalidDate(format!(
                "uploaded key's date {key_date} does not match the delayed-key date {} claimed by the V1 JWT",
                claims.onset
            )));
        }

        let ua = user_agent(&headers).to_string();
        let inserted = state
            .insert_manager
            .insert_into_database(vec![body.key], &ua, &claims, &state.config, now_ms)
            .await?;
        Metrics::add(&state.metrics.keys_inserted, inserted);
        Ok(StatusCode::OK.into_response())
    }
    .await;

    match &result {
        Ok(_) => Metrics::inc(&state.metrics.uploads_accepted),
        Err(_) => Metrics::inc(&state.metrics.uploads_rejected),
    }

    if result.is_ok() {
        time_level(arrival, state.config.request_time_ms).await;
    }
    result
}

/// Calendar date (UTC) of a key's rolling-start window.
fn key_rolling_start_date(key: &Tek) -> Result<NaiveDate, AppError> {
    chrono::DateTime::from_timestamp(key.start_ms() / 1000, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| AppError::InvalidDate("rolling start out of range".into()))
}

async fn upload_v2_like(
    state: AppState,
    headers: HeaderMap,
    keys: Vec<Tek>,
) -> Result<Response, AppError> {
    let arrival = Instant::now();
    let now_ms = state.clock.now_ms();

    let result = async {
        let token = bearer_token(&headers)?;
        let claims = state.auth.decode(token, "exposed", now_ms)?;
        state.auth.validate(&claims, "exposed")?;

        let ua = user_agent(&headers).to_string();
        let inserted = state
            .insert_manager
            .insert_into_database(keys, &ua, &claims, &state.config, now_ms)
            .await?;
        Metrics::add(&state.metrics.keys_inserted, inserted);
        Ok(StatusCode::OK.into_response())
    }
    .await;

    match &result {
        Ok(_) => Metrics::inc(&state.metrics.uploads_accepted),
        Err(_) => Metrics::inc(&state.metrics.uploads_rejected),
    }

    if result.is_ok() {
        time_level(arrival, state.config.request_time_ms).await;
    }
    result
}

pub async fn upload_v2(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<V2UploadRequest>,
) -> Result<Response, AppError> {
    upload_v2_like(state, headers, body.keys).await
}

pub async fn upload_v2_uma(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<V2UploadRequest>,
) -> Result<Response, AppError> {
    upload_v2_like(state, headers, body.keys).await
}
