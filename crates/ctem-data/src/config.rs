//! Data layer configuration
//!
//! Read once when a [`DataContext`](crate::DataContext) is built. Values come
//! from the defaults, a TOML file, or `CTEM_*` environment variables laid over
//! either.

use ctem_client::{ApiError, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Result alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML did not match the schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment variable had an unparsable value
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// Values parse but can not be used together
    #[error("invalid config: {0}")]
    Invalid(String),

    /// HTTP client construction failed
    #[error("client setup failed: {0}")]
    Client(#[from] ApiError),
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,ctem_cache=debug`
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Data layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Talk to the REST API instead of in-memory fixtures
    pub use_real_api: bool,

    /// API origin, without the `/api/v1` prefix
    pub api_base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum cached responses
    pub cache_capacity: u64,

    /// Window in which identical reads share one response, milliseconds
    pub dedupe_interval_ms: u64,

    /// Retry policy for reads
    pub retry: RetryPolicy,

    /// Revalidate mounted queries when the window regains focus
    pub revalidate_on_focus: bool,

    /// Revalidate mounted queries when connectivity returns
    pub revalidate_on_reconnect: bool,

    /// Background polling interval, milliseconds; off when unset
    pub refresh_interval_ms: Option<u64>,

    /// Log output
    pub log: LogConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            use_real_api: false,
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            cache_capacity: ctem_cache::DEFAULT_CAPACITY,
            dedupe_interval_ms: 2_000,
            retry: RetryPolicy::default(),
            revalidate_on_focus: false,
            revalidate_on_reconnect: true,
            refresh_interval_ms: None,
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set mock/real mode
    #[inline]
    #[must_use]
    pub fn with_real_api(mut self, enabled: bool) -> Self {
        self.use_real_api = enabled;
        self
    }

    /// Set API origin
    #[inline]
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Set cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set dedupe window
    #[inline]
    #[must_use]
    pub fn with_dedupe_interval(mut self, interval: Duration) -> Self {
        self.dedupe_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set read retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Toggle focus revalidation
    #[inline]
    #[must_use]
    pub fn with_revalidate_on_focus(mut self, enabled: bool) -> Self {
        self.revalidate_on_focus = enabled;
        self
    }

    /// Toggle reconnect revalidation
    #[inline]
    #[must_use]
    pub fn with_revalidate_on_reconnect(mut self, enabled: bool) -> Self {
        self.revalidate_on_reconnect = enabled;
        self
    }

    /// Set background polling interval
    #[inline]
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval_ms =
            interval.map(|i| u64::try_from(i.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set log output
    #[inline]
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Dedupe window
    #[inline]
    #[must_use]
    pub fn dedupe_interval(&self) -> Duration {
        Duration::from_millis(self.dedupe_interval_ms)
    }

    /// Background polling interval
    #[inline]
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed input and
    /// `ConfigError::Invalid` for unusable values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` when the file can not be read, otherwise as
    /// [`SyncConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults overlaid with `CTEM_*` environment variables
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidEnv` for unparsable values.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay variables from `lookup` onto this configuration
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidEnv` for unparsable values.
    pub fn overlay<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = read_var(&lookup, "CTEM_USE_REAL_API")? {
            self.use_real_api = value;
        }
        if let Some(value) = lookup("CTEM_API_BASE_URL") {
            self.api_base_url = value;
        }
        if let Some(value) = read_var(&lookup, "CTEM_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = value;
        }
        if let Some(value) = read_var(&lookup, "CTEM_DEDUPE_INTERVAL_MS")? {
            self.dedupe_interval_ms = value;
        }
        if let Some(value) = read_var(&lookup, "CTEM_RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = value;
        }
        if let Some(value) = read_var(&lookup, "CTEM_RETRY_INTERVAL_MS")? {
            self.retry.interval_ms = value;
        }
        if let Some(value) = read_var(&lookup, "CTEM_CACHE_CAPACITY")? {
            self.cache_capacity = value;
        }
        if let Some(value) = lookup("CTEM_LOG") {
            self.log.filter = value;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject unusable combinations
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.use_real_api && self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "api_base_url is required when use_real_api is set".into(),
            ));
        }
        Ok(())
    }
}

fn read_var<F, T>(lookup: &F, var: &'static str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_dashboard_policy() {
        let config = SyncConfig::new();
        assert!(!config.use_real_api);
        assert!(!config.revalidate_on_focus);
        assert!(config.revalidate_on_reconnect);
        assert_eq!(config.dedupe_interval(), Duration::from_secs(2));
        assert_eq!(config.retry, RetryPolicy::fixed(3, Duration::from_secs(1)));
        assert_eq!(config.refresh_interval(), None);
    }

    #[test]
    fn builder_methods() {
        let config = SyncConfig::new()
            .with_real_api(true)
            .with_api_base_url("https://ctem.example.com")
            .with_dedupe_interval(Duration::from_millis(500))
            .with_refresh_interval(Some(Duration::from_secs(30)));
        assert!(config.use_real_api);
        assert_eq!(config.dedupe_interval_ms, 500);
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn toml_partial_uses_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            use_real_api = true
            api_base_url = "https://ctem.example.com"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert!(config.use_real_api);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.interval_ms, 1000);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn toml_rejects_zero_capacity() {
        let err = SyncConfig::from_toml_str("cache_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("CTEM_USE_REAL_API", "true"),
            ("CTEM_API_BASE_URL", "https://api.internal"),
            ("CTEM_RETRY_MAX_ATTEMPTS", "1"),
            ("CTEM_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let config = SyncConfig::default()
            .overlay(|name| vars.get(name).map(ToString::to_string))
            .unwrap();
        assert!(config.use_real_api);
        assert_eq!(config.api_base_url, "https://api.internal");
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.log.filter, "debug");
    }

    #[test]
    fn env_overlay_rejects_garbage() {
        let err = SyncConfig::default()
            .overlay(|name| (name == "CTEM_CACHE_CAPACITY").then(|| "lots".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"lots\" for CTEM_CACHE_CAPACITY");
    }
}
