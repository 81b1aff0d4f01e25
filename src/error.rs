//! Crate-wide error type and its HTTP mapping (kind -> status code per
//! the error table: BadKeyFormat/InvalidDate/InvalidRollingPeriod/
//! ClaimIsBeforeOnset -> 400, WrongScope/AuthFailure -> 403, NotFound -> 404,
//! Transient -> 500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad key format")]
    BadKeyFormat,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("batch release time out of window")]
    BadBatchReleaseTime,
    #[error("invalid rolling period")]
    InvalidRollingPeriod,
    #[error("onset is after the earliest key")]
    ClaimIsBeforeOnset,
    #[error("wrong scope: {0}")]
    WrongScope(String),
    #[error("auth failure: {0}")]
    AuthFailure(String),
    #[error("batch tag not found")]
    NotFound,
    #[error("transient failure: {0}")]
    Transient(#[from] anyhow::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("signing error: {0}")]
    Signing(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadKeyFormat
            | AppError::InvalidDate(_)
            | AppError::BadBatchReleaseTime
            | AppError::InvalidRollingPeriod
            | AppError::ClaimIsBeforeOnset => StatusCode::BAD_REQUEST,
            AppError::WrongScope(_) | AppError::AuthFailure(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Transient(_) | AppError::Database(_) | AppError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => error!(error = %self, "request_failed"),
            _ => warn!(error = %self, "request_rejected"),
        }

        // Infrastructure failures are surfaced opaquely; client-caused
        // rejections carry their message, it's already a closed vocabulary.
        let body = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            _ => self.to_string(),
        };
        (status, body).into_response()
    }
}
