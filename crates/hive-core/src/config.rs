use std::path::PathBuf;
use std::time::Duration;

use crate::PageDefaults;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct HiveConfig {
    /// When unset the service answers from the fixture file instead of Postgres.
    pub database_url: Option<String>,
    pub fixtures_path: PathBuf,
    pub web_port: u16,
    pub admin_token: Option<String>,
    pub page_defaults: PageDefaults,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// Queries slower than this are logged at WARN.
    pub slow_query_threshold: Option<Duration>,
    pub log_json: bool,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            fixtures_path: PathBuf::from("fixtures/listings.json"),
            web_port: 8000,
            admin_token: None,
            page_defaults: PageDefaults::default(),
            db_max_connections: 5,
            db_acquire_timeout: Duration::from_secs(5),
            slow_query_threshold: None,
            log_json: false,
        }
    }
}

impl HiveConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            database_url: non_empty("DATABASE_URL"),
            fixtures_path: non_empty("HIVE_FIXTURES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixtures_path),
            web_port: parsed("HIVE_WEB_PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(defaults.web_port),
            admin_token: non_empty("HIVE_ADMIN_TOKEN"),
            page_defaults: PageDefaults {
                items: parsed("HIVE_DEFAULT_PAGE_SIZE")
                    .and_then(|v| u32::try_from(v).ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.page_defaults.items),
                max_items: parsed("HIVE_MAX_PAGE_SIZE")
                    .and_then(|v| u32::try_from(v).ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(defaults.page_defaults.max_items),
            },
            db_max_connections: parsed("HIVE_DB_MAX_CONNECTIONS")
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.db_max_connections),
            db_acquire_timeout: parsed("HIVE_DB_ACQUIRE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.db_acquire_timeout),
            slow_query_threshold: parsed("HIVE_DB_LOG_MIN_DURATION_MS")
                .filter(|v| *v > 0)
                .map(Duration::from_millis),
            log_json: non_empty("HIVE_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}
