//! Mandatory filters for the exposed endpoint, applied in declared order:
//! AssertKeyFormat, EnforceMatchingJWTClaims, EnforceRetentionPeriod,
//! RemoveFakeKeys, EnforceValidRollingPeriod.

use crate::error::AppError;
use crate::model::Tek;
use crate::validation;

use super::{InsertContext, KeyFilter};

/// Hard-fails with `BadKeyFormat` on any malformed key.
pub struct AssertKeyFormat;

impl KeyFilter for AssertKeyFormat {
    fn apply(&self, keys: Vec<Tek>, ctx: &InsertContext) -> Result<Vec<Tek>, AppError> {
        for k in &keys {
            if !validation::is_valid_key_format(k, ctx.config.gaen_key_size_bytes) {
                return Err(AppError::BadKeyFormat);
            }
        }
        Ok(keys)
    }
}

/// Checks the JWT's `onset` and `fake` claims are consistent with the
/// batch: the onset date cannot be after the earliest key's date, and a
/// `fake` claim must match what the batch actually carries — a fake claim
/// smuggling real keys would lose them silently to `RemoveFakeKeys`, and a
/// real claim padded out with an all-fake batch is a scope mismatch, not a
/// normal upload.
pub struct EnforceMatchingJwtClaims;

impl KeyFilter for EnforceMatchingJwtClaims {
    fn apply(&self, keys: Vec<Tek>, ctx: &InsertContext) -> Result<Vec<Tek>, AppError> {
        let Some(earliest) = keys.iter().map(|k| k.start_ms()).min() else {
            return Ok(keys);
        };
        let onset_ms = ctx
            .claims
            .onset
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc()
            .timestamp_millis();
        if onset_ms > earliest {
            return Err(AppError::ClaimIsBeforeOnset);
        }

        let all_fake = keys.iter().all(Tek::is_fake);
        let any_fake = keys.iter().any(Tek::is_fake);
        if ctx.claims.fake && !all_fake {
            return Err(AppError::WrongScope("fake claim carries real keys".into()));
        }
        if !ctx.claims.fake && any_fake && all_fake {
            return Err(AppError::WrongScope("non-fake claim carries an all-fake batch".into()));
        }

        Ok(keys)
    }
}

/// Drops keys outside the retention window (either end): already beyond
/// retention, or further in the future than the configured clock skew
/// allows.
pub struct EnforceRetentionPeriod;

impl KeyFilter for EnforceRetentionPeriod {
    fn apply(&self, keys: Vec<Tek>, ctx: &InsertContext) -> Result<Vec<Tek>, AppError> {
        let retention_ms = ctx.config.retention_ms();
        Ok(keys
            .into_iter()
            .filter(|k| {
                !validation::is_before_retention(k, ctx.now_ms, retention_ms)
                    && !validation::is_in_future(k, ctx.now_ms, ctx.config.time_skew_ms)
            })
            .collect())
    }
}

/// Drops `fake=1` keys — they're accepted (so the client sees a normal
/// ACK) but never inserted.
pub struct RemoveFakeKeys;

impl KeyFilter for RemoveFakeKeys {
    fn apply(&self, keys: Vec<Tek>, _ctx: &InsertContext) -> Result<Vec<Tek>, AppError> {
        Ok(keys.into_iter().filter(|k| !k.is_fake()).collect())
    }
}

pub struct EnforceValidRollingPeriod;

impl KeyFilter for EnforceValidRollingPeriod {
    fn apply(&self, keys: Vec<Tek>, _ctx: &InsertContext) -> Result<Vec<Tek>, AppError> {
        Ok(keys
            .into_iter()
            .filter(validation::is_valid_rolling_period)
            .collect())
    }
}
