//! Mandatory `OriginStamp` modifier plus the optional, configuration-gated
//! legacy-client workarounds.

use crate::insert::Platform;
use crate::model::Tek;

use super::{InsertContext, KeyModifier};

/// Stamps `origin` and `report_type` from configuration on every key that
/// doesn't already carry them. A modifier, not hard-wired into the store,
/// so a deployment can opt out of federation stamping by omitting it.
pub struct OriginStamp;

impl KeyModifier for OriginStamp {
    fn apply(&self, keys: Vec<Tek>, ctx: &InsertContext) -> Vec<Tek> {
        keys.into_iter()
            .map(|mut k| {
                if k.origin.is_none() {
                    k.origin = Some(ctx.config.efgs_country_origin.clone());
                }
                if k.report_type.is_none() {
                    k.report_type = Some(ctx.config.efgs_report_type);
                }
                k
            })
            .collect()
    }
}

/// Legacy Android client workaround: `rollingPeriod == 0` meant "whole
/// day" on some clients that never set the field.
pub struct AndroidZeroRollingPeriod;

impl KeyModifier for AndroidZeroRollingPeriod {
    fn apply(&self, keys: Vec<Tek>, _ctx: &InsertContext) -> Vec<Tek> {
        keys.into_iter()
            .map(|mut k| {
                if k.rolling_period == 0 {
                    k.rolling_period = 144;
                }
                k
            })
            .collect()
    }
}

/// Legacy iOS client workaround: short rolling periods on iOS are rounded
/// up to a full day.
pub struct IosShortPeriod;

impl KeyModifier for IosShortPeriod {
    fn apply(&self, keys: Vec<Tek>, ctx: &InsertContext) -> Vec<Tek> {
        if ctx.platform != Platform::Ios {
            return keys;
        }
        keys.into_iter()
            .map(|mut k| {
                if k.rolling_period < 144 {
                    k.rolling_period = 144;
                }
                k
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::config::Config;
    use crate::model::fixture_key;

    fn test_config() -> Config {
        Config {
            release_bucket_duration_ms: 7_200_000,
            request_time_ms: 1_500,
            exposed_list_cache_control_ms: 300_000,
            retention_days: 14,
            gaen_key_size_bytes: 16,
            random_keys_enabled: false,
            random_key_amount: 10,
            gaen_algorithm_oid: "1.2.840.10045.4.3.2".into(),
            gaen_region: "es".into(),
            bundle_id: "test".into(),
            package_name: "test".into(),
            key_version: "v1".into(),
            key_identifier: "214".into(),
            time_skew_ms: 2 * 3_600_000,
            efgs_country_origin: "ES".into(),
            efgs_report_type: 1,
            database_url: "postgres://unused".into(),
            port: 0,
            request_timeout_ms: 5_000,
        }
    }

    fn test_claims() -> Claims {
        Claims {
            scope: "exposed".into(),
            onset: "1970-01-01".parse().unwrap(),
            fake: false,
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn origin_stamp_only_fills_missing_fields() {
        let cfg = test_config();
        let claims = test_claims();
        let ctx = InsertContext {
            now_ms: 0,
            config: &cfg,
            claims: &claims,
            platform: Platform::Unknown,
        };
        let mut stamped = fixture_key(1, 0);
        stamped.origin = Some("FR".into());
        let unstamped = fixture_key(2, 0);
        let result = OriginStamp.apply(vec![stamped, unstamped], &ctx);
        assert_eq!(result[0].origin.as_deref(), Some("FR"));
        assert_eq!(result[1].origin.as_deref(), Some("ES"));
        assert_eq!(result[1].report_type, Some(1));
    }

    #[test]
    fn android_zero_rolling_period_becomes_full_day() {
        let cfg = test_config();
        let claims = test_claims();
        let ctx = InsertContext {
            now_ms: 0,
            config: &cfg,
            claims: &claims,
            platform: Platform::Android,
        };
        let mut k = fixture_key(1, 0);
        k.rolling_period = 0;
        let result = AndroidZeroRollingPeriod.apply(vec![k], &ctx);
        assert_eq!(result[0].rolling_period, 144);
    }

    #[test]
    fn ios_short_period_only_applies_on_ios() {
        let cfg = test_config();
        let claims = test_claims();
        let mut k = fixture_key(1, 0);
        k.rolling_period = 50;

        let ctx_android = InsertContext {
            now_ms: 0,
            config: &cfg,
            claims: &claims,
            platform: Platform::Android,
        };
        let unchanged = IosShortPeriod.apply(vec![k.clone()], &ctx_android);
        assert_eq!(unchanged[0].rolling_period, 50);

        let ctx_ios = InsertContext {
            now_ms: 0,
            config: &cfg,
            claims: &claims,
            platform: Platform::Ios,
        };
        let rounded = IosShortPeriod.apply(vec![k], &ctx_ios);
        assert_eq!(rounded[0].rolling_period, 144);
    }
}
