//! Ordered filter + modifier pipeline for uploads. A pipeline run is
//! all-or-nothing w.r.t. the database write: any hard failure produces no
//! insertion.

use std::sync::Arc;

use crate::auth::Claims;
use crate::config::Config;
use crate::error::AppError;
use crate::model::Tek;
use crate::store::exposed::ExposedRepository;
use crate::time::next_bucket;

use super::{InsertContext, KeyFilter, KeyModifier, Platform};

pub struct InsertManager {
    filters: Vec<Box<dyn KeyFilter>>,
    modifiers: Vec<Box<dyn KeyModifier>>,
    store: Arc<dyn ExposedRepository>,
}

impl InsertManager {
    /// Builds the pipeline used by the exposed endpoints: the five
    /// mandatory filters, the mandatory `OriginStamp` modifier, and the
    /// optional legacy-client modifiers gated by configuration.
    pub fn for_exposed_endpoint(
        store: Arc<dyn ExposedRepository>,
        android_zero_rolling_period: bool,
        ios_short_period: bool,
    ) -> Self {
        use super::filters::*;
        use super::modifiers::*;

        let mut modifiers: Vec<Box<dyn KeyModifier>> = vec![Box::new(OriginStamp)];
        if android_zero_rolling_period {
            modifiers.push(Box::new(AndroidZeroRollingPeriod));
        }
        if ios_short_period {
            modifiers.push(Box::new(IosShortPeriod));
        }

        Self {
            filters: vec![
                Box::new(AssertKeyFormat),
                Box::new(EnforceMatchingJwtClaims),
                Box::new(EnforceRetentionPeriod),
                Box::new(RemoveFakeKeys),
                Box::new(EnforceValidRollingPeriod),
            ],
            modifiers,
            store,
        }
    }

    pub async fn insert_into_database(
        &self,
        keys: Vec<Tek>,
        user_agent: &str,
        claims: &Claims,
        config: &Config,
        now_ms: i64,
    ) -> Result<u64, AppError> {
        let ctx = InsertContext {
            now_ms,
            config,
            claims,
            platform: Platform::from_user_agent(user_agent),
        };

        let mut surviving = keys;
        for filter in &self.filters {
            surviving = filter.apply(surviving, &ctx)?;
        }
        for modifier in &self.modifiers {
            surviving = modifier.apply(surviving, &ctx);
        }

        let received_at = next_bucket(now_ms, config.release_bucket_duration_ms);
        self.store
            .upsert_exposed(&surviving, received_at, Some(&config.efgs_country_origin))
            .await
    }
}
