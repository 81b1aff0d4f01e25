pub mod filters;
pub mod manager;
pub mod modifiers;

use crate::auth::Claims;
use crate::config::Config;

/// Client platform as read from `User-Agent`, used by `IOSShortPeriod`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Unknown,
}

impl Platform {
    pub fn from_user_agent(ua: &str) -> Self {
        let lower = ua.to_ascii_lowercase();
        if lower.contains("ios") || lower.contains("iphone") || lower.contains("ipad") {
            Platform::Ios
        } else if lower.contains("android") {
            Platform::Android
        } else {
            Platform::Unknown
        }
    }
}

/// Shared context threaded through every filter and modifier in a single
/// pipeline run.
pub struct InsertContext<'a> {
    pub now_ms: i64,
    pub config: &'a Config,
    pub claims: &'a Claims,
    pub platform: Platform,
}

/// A drop predicate: consumes the surviving sequence, returns a possibly
/// smaller one, or raises a hard error aborting the whole insert.
pub trait KeyFilter: Send + Sync {
    fn apply(
        &self,
        keys: Vec<crate::model::Tek>,
        ctx: &InsertContext,
    ) -> Result<Vec<crate::model::Tek>, crate::error::AppError>;
}

/// An in-place or derive-new transform. Modifiers never fail; one that
/// cannot transform a key leaves it unchanged.
pub trait KeyModifier: Send + Sync {
    fn apply(&self, keys: Vec<crate::model::Tek>, ctx: &InsertContext) -> Vec<crate::model::Tek>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_detection_is_case_insensitive() {
        assert_eq!(Platform::from_user_agent("MyApp/1.0 (iOS 17)"), Platform::Ios);
        assert_eq!(Platform::from_user_agent("MyApp/1.0 (Android 14)"), Platform::Android);
        assert_eq!(Platform::from_user_agent("curl/8.0"), Platform::Unknown);
    }
}
