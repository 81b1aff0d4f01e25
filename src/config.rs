//! Typed configuration loaded from the environment. Mirrors the defaults
//! named in the Configuration table: every key has a hardcoded fallback so
//! a deployment can start with zero env vars except `DATABASE_URL`.

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Clone, Debug)]
pub struct Config {
    pub release_bucket_duration_ms: i64,
    pub request_time_ms: i64,
    pub exposed_list_cache_control_ms: i64,
    pub retention_days: i64,
    pub gaen_key_size_bytes: usize,
    pub random_keys_enabled: bool,
    pub random_key_amount: usize,
    pub gaen_algorithm_oid: String,
    pub gaen_region: String,
    pub bundle_id: String,
    pub package_name: String,
    pub key_version: String,
    pub key_identifier: String,
    pub time_skew_ms: i64,
    pub efgs_country_origin: String,
    pub efgs_report_type: i32,
    pub database_url: String,
    pub port: u16,
    pub request_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            release_bucket_duration_ms: env_or("RELEASE_BUCKET_DURATION_MS", 7_200_000),
            request_time_ms: env_or("REQUEST_TIME_MS", 1_500),
            exposed_list_cache_control_ms: env_or("EXPOSED_LIST_CACHE_CONTROL_MS", 300_000),
            retention_days: env_or("RETENTION_DAYS", 14),
            gaen_key_size_bytes: env_or("GAEN_KEY_SIZE_BYTES", 16),
            random_keys_enabled: env_or("RANDOM_KEYS_ENABLED", false),
            random_key_amount: env_or("RANDOM_KEY_AMOUNT", 10),
            gaen_algorithm_oid: env_string_or("GAEN_ALGORITHM", "1.2.840.10045.4.3.2"),
            gaen_region: env_string_or("GAEN_REGION", "es"),
            bundle_id: env_string_or("BUNDLE_ID", "org.example.gaen"),
            package_name: env_string_or("PACKAGE_NAME", "org.example.gaen"),
            key_version: env_string_or("KEY_VERSION", "v1"),
            key_identifier: env_string_or("KEY_IDENTIFIER", "214"),
            time_skew_ms: env_or("TIME_SKEW_MS", 2 * 3_600_000),
            efgs_country_origin: env_string_or("EFGS_COUNTRY_ORIGIN", "ES"),
            efgs_report_type: env_or("EFGS_REPORT_TYPE", 1),
            database_url: std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set — no sane default for an external dependency"),
            port: env_or("PORT", 8080),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", 5_000),
        }
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_days * 86_400_000
    }
}
