//! Configuration loader — merges env vars, .env file, config.toml, and CLI flags.

use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use common::config::{validate, ExporterConfig};
use common::{Error, Region};

/// Fully resolved runtime settings: merged config plus the parsed region
/// set and timezone.
pub struct Settings {
    pub config: ExporterConfig,
    pub regions: Vec<Region>,
    pub tz: Tz,
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

/// Load exporter settings from environment, optional config file, and the
/// regions passed on the command line.
pub fn load_settings(cli_regions: &[String]) -> Result<Settings, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = ExporterConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(url) = std::env::var("VATTENFALL_BASE_URL") {
        config.upstream.base_url = url;
    }
    if let Ok(tz) = std::env::var("VATTENFALL_TIMEZONE") {
        config.timezone = tz;
    }
    if let Ok(raw) = std::env::var("VATTENFALL_REQUEST_TIMEOUT_SECS") {
        config.upstream.request_timeout_secs =
            parse_positive_u64(&raw, "VATTENFALL_REQUEST_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("VATTENFALL_REFRESH_INTERVAL_SECS") {
        config.cache.refresh_interval_secs =
            parse_positive_u64(&raw, "VATTENFALL_REFRESH_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("VATTENFALL_RETRY_BACKOFF_SECS") {
        config.cache.retry_backoff_secs =
            parse_positive_u64(&raw, "VATTENFALL_RETRY_BACKOFF_SECS")?;
    }
    if let Ok(raw) = std::env::var("VATTENFALL_RETRY_BACKOFF_MAX_SECS") {
        config.cache.retry_backoff_max_secs =
            parse_positive_u64(&raw, "VATTENFALL_RETRY_BACKOFF_MAX_SECS")?;
    }

    // 5. Validate required fields.
    validate(&config)?;

    let tz = Tz::from_str(config.timezone.trim())
        .map_err(|_| Error::Config(format!("unknown timezone {:?}", config.timezone)))?;

    let regions = cli_regions
        .iter()
        .map(|raw| raw.parse())
        .collect::<Result<Vec<Region>, Error>>()?;
    if regions.is_empty() {
        return Err(Error::Config(
            "need at least one region (pass --region, e.g. --region SN1)".into(),
        ));
    }

    Ok(Settings {
        config,
        regions,
        tz,
    })
}
