//! Exporter configuration types with defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

pub const DEFAULT_TIMEZONE: &str = "Europe/Helsinki";

/// Exporter configuration, merged from `config.toml`, environment
/// variables, and CLI flags by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// IANA timezone name the upstream's civil hours are aligned to.
    pub timezone: String,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Upstream pricing API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.vattenfall.fi".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Freshness and retry policy for cached region data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a successful fetch stays fresh.
    pub refresh_interval_secs: u64,
    /// Cool-down after the first failed fetch attempt.
    pub retry_backoff_secs: u64,
    /// Cap for the doubling cool-down on consecutive failures.
    pub retry_backoff_max_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3600,
            retry_backoff_secs: 30,
            retry_backoff_max_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_max_secs)
    }
}

/// Validate cross-field constraints, collecting all issues at once.
pub fn validate(config: &ExporterConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.timezone.trim().is_empty() {
        issues.push("timezone must not be empty".into());
    }
    if config.upstream.base_url.trim().is_empty() {
        issues.push("upstream.base_url must not be empty".into());
    }
    if config.upstream.request_timeout_secs == 0 {
        issues.push("upstream.request_timeout_secs must be > 0".into());
    }
    if config.cache.refresh_interval_secs == 0 {
        issues.push("cache.refresh_interval_secs must be > 0".into());
    }
    if config.cache.retry_backoff_secs == 0 {
        issues.push("cache.retry_backoff_secs must be > 0".into());
    }
    if config.cache.retry_backoff_max_secs < config.cache.retry_backoff_secs {
        issues.push("cache.retry_backoff_max_secs must be >= cache.retry_backoff_secs".into());
    }
    if config.cache.retry_backoff_max_secs >= config.cache.refresh_interval_secs {
        issues.push("cache.retry_backoff_max_secs must be < cache.refresh_interval_secs".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&ExporterConfig::default()).is_ok());
    }

    #[test]
    fn test_backoff_must_stay_below_refresh() {
        let mut config = ExporterConfig::default();
        config.cache.retry_backoff_max_secs = config.cache.refresh_interval_secs;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = ExporterConfig::default();
        config.upstream.base_url = "  ".into();
        assert!(validate(&config).is_err());
    }
}
