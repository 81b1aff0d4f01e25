//! Incremental-download protocol: tag accounting, cache headers, and
//! dispatch into the export assembler.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::export::assembler::{ExportAssembler, CONTENT_TYPE_ZIP};
use crate::export::BundleVersion;
use crate::metrics::Metrics;
use crate::time::{bucket_start, next_bucket};
use crate::AppState;

#[derive(Deserialize, Default)]
pub struct DownloadQuery {
    #[serde(rename = "lastKeyBundleTag")]
    pub last_key_bundle_tag: Option<i64>,
    #[serde(rename = "visitedCountries")]
    pub visited_countries: Option<String>,
    #[serde(rename = "originCountries")]
    pub origin_countries: Option<String>,
}

fn split_csv(s: &Option<String>) -> Option<Vec<String>> {
    s.as_ref().map(|v| v.split(',').map(|c| c.trim().to_string()).collect())
}

/// Resolves the effective `lastKeyBundleTag`: clamps a null or stale tag up
/// to the retention floor, rejects a misaligned or future one. Pulled out
/// of the handler so the tag arithmetic in steps 2-4 of the download
/// contract can be tested without a database.
pub fn resolve_last_tag(
    requested: Option<i64>,
    now: i64,
    bucket_ms: i64,
    retention_ms: i64,
) -> Result<i64, AppError> {
    let min_tag = bucket_start(now - retention_ms, bucket_ms);
    match requested {
        None => Ok(min_tag),
        Some(t) if t < min_tag => Ok(min_tag),
        Some(t) if t > now || t != bucket_start(t, bucket_ms) => Err(AppError::NotFound),
        Some(t) => Ok(t),
    }
}

async fn handle_download(
    state: &AppState,
    query: DownloadQuery,
    version: BundleVersion,
) -> Result<Response, AppError> {
    let now = state.clock.now_ms();
    let bucket_ms = state.config.release_bucket_duration_ms;
    let retention_ms = state.config.retention_ms();

    let key_bundle_tag = bucket_start(now, bucket_ms);
    let expires = next_bucket(now, bucket_ms);

    let last_tag = match resolve_last_tag(query.last_key_bundle_tag, now, bucket_ms, retention_ms) {
        Ok(t) => t,
        Err(e) => {
            Metrics::inc(&state.metrics.downloads_rejected);
            return Err(e);
        }
    };

    let visited = split_csv(&query.visited_countries);
    let origin = split_csv(&query.origin_countries);

    let mut keys = state
        .exposed_store
        .get_sorted_exposed_since(
            last_tag,
            now,
            bucket_ms,
            visited.as_deref(),
            origin.as_deref(),
        )
        .await?
        .into_iter()
        .map(|row| row.tek)
        .collect::<Vec<_>>();

    // Fake keys are unioned with real keys with no distinction at export
    // time.
    keys.extend(
        state
            .fake_key_service
            .all_keys()
            .into_iter()
            .filter(|k| {
                let received_at = next_bucket(k.start_ms(), bucket_ms);
                received_at >= last_tag && received_at < key_bundle_tag
            }),
    );

    let mut headers = HeaderMap::new();
    headers.insert("x-key-bundle-tag", HeaderValue::from(key_bundle_tag));
    let expires_dt = chrono::DateTime::<Utc>::from_timestamp_millis(expires).unwrap_or_default();
    headers.insert(
        "Expires",
        HeaderValue::from_str(&expires_dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );

    if keys.is_empty() {
        Metrics::inc(&state.metrics.downloads_empty);
        return Ok((StatusCode::NO_CONTENT, headers).into_response());
    }

    let vault_key = state.vault.get("gaen")?;
    let assembler = ExportAssembler::new(&state.config, vault_key);
    let bundle = assembler.assemble(keys, key_bundle_tag, bucket_ms, version)?;

    match bundle {
        Some(bytes) => {
            Metrics::inc(&state.metrics.downloads_served);
            headers.insert("Content-Type", HeaderValue::from_static(CONTENT_TYPE_ZIP));
            Ok((StatusCode::OK, headers, bytes).into_response())
        }
        None => {
            Metrics::inc(&state.metrics.downloads_empty);
            Ok((StatusCode::NO_CONTENT, headers).into_response())
        }
    }
}

pub async fn download_v1(
    State(state): State<AppState>,
    Path(batch_release_time): Path<i64>,
) -> Result<Response, AppError> {
    let query = DownloadQuery {
        last_key_bundle_tag: Some(batch_release_time),
        ..Default::default()
    };
    handle_download(&state, query, BundleVersion::V1).await
}

pub async fn download_v2(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    handle_download(&state, query, BundleVersion::V2).await
}

pub async fn download_v2_uma(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    handle_download(&state, query, BundleVersion::V2Uma).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_splits() {
        let v = split_csv(&Some("ES, FR,it".to_string())).unwrap();
        assert_eq!(v, vec!["ES", "FR", "it"]);
    }

    #[test]
    fn split_csv_none_stays_none() {
        assert!(split_csv(&None).is_none());
    }

    const BUCKET: i64 = 600_000;
    const RETENTION: i64 = 14 * 86_400_000;

    #[test]
    fn missing_tag_clamps_to_retention_floor() {
        let now = 100 * BUCKET;
        let min_tag = bucket_start(now - RETENTION, BUCKET);
        assert_eq!(resolve_last_tag(None, now, BUCKET, RETENTION).unwrap(), min_tag);
    }

    #[test]
    fn stale_tag_is_clamped_up_not_rejected() {
        let now = 100 * BUCKET;
        let min_tag = bucket_start(now - RETENTION, BUCKET);
        let ancient = min_tag - 50 * BUCKET;
        assert_eq!(
            resolve_last_tag(Some(ancient), now, BUCKET, RETENTION).unwrap(),
            min_tag
        );
    }

    #[test]
    fn aligned_tag_within_window_passes_through() {
        let now = 100 * BUCKET;
        let min_tag = bucket_start(now - RETENTION, BUCKET);
        let tag = min_tag + 3 * BUCKET;
        assert_eq!(resolve_last_tag(Some(tag), now, BUCKET, RETENTION).unwrap(), tag);
    }

    #[test]
    fn misaligned_tag_is_rejected() {
        let now = 100 * BUCKET;
        let tag = bucket_start(now, BUCKET) - 1;
        assert!(resolve_last_tag(Some(tag), now, BUCKET, RETENTION).is_err());
    }

    #[test]
    fn future_tag_is_rejected() {
        let now = 100 * BUCKET;
        let tag = bucket_start(now, BUCKET) + BUCKET;
        assert!(resolve_last_tag(Some(tag), now, BUCKET, RETENTION).is_err());
    }
}
