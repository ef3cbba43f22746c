//! Rate service configuration.

use std::path::PathBuf;
use std::time::Duration;

use ratekeeper_common::constants;
use tracing::warn;

use crate::transport::Endpoint;

/// Primary provider (free, EUR base).
pub const VATCOMPLY_URL: &str = "https://api.vatcomply.com/rates";

/// Secondary provider (requires an access key).
pub const FXRATES_URL: &str = "https://api.fxratesapi.com/latest";

/// Configuration for rate acquisition and caching.
#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// Endpoint tried before the built-in providers.
    pub custom_endpoint: Option<String>,
    /// Age after which cached rates are stale.
    pub cache_ttl: chrono::Duration,
    /// Per-endpoint request timeout.
    pub request_timeout: Duration,
    /// Access key for the secondary provider. Without one it is skipped.
    pub fxrates_api_key: Option<String>,
    /// Directory for the file-backed store.
    pub data_dir: PathBuf,
    /// Log level.
    pub log_level: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            custom_endpoint: None,
            cache_ttl: constants::default_cache_ttl(),
            request_timeout: constants::default_request_timeout(),
            fxrates_api_key: None,
            data_dir: PathBuf::from(".ratekeeper"),
            log_level: "info".to_string(),
        }
    }
}

impl RatesConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source, on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("EXCHANGE_API_URL") {
            config.custom_endpoint = Some(url);
        }

        if let Some(minutes) = lookup("CACHE_EXPIRY_MINUTES") {
            match minutes.trim().parse::<i64>() {
                Ok(parsed) => match chrono::Duration::try_minutes(parsed) {
                    Some(ttl) => config.cache_ttl = ttl,
                    None => warn!(value = %minutes, "Ignoring out of range CACHE_EXPIRY_MINUTES"),
                },
                Err(e) => warn!(value = %minutes, error = %e, "Ignoring CACHE_EXPIRY_MINUTES"),
            }
        }

        if let Some(ms) = lookup("REQUEST_TIMEOUT_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => config.request_timeout = Duration::from_millis(ms),
                Err(e) => warn!(value = %ms, error = %e, "Ignoring REQUEST_TIMEOUT_MS"),
            }
        }

        if let Some(key) = lookup("FXRATES_API_KEY") {
            if !key.trim().is_empty() {
                config.fxrates_api_key = Some(key);
            }
        }

        if let Some(dir) = lookup("RATEKEEPER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_ttl <= chrono::Duration::zero() {
            return Err("Cache TTL must be positive".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if let Some(url) = &self.custom_endpoint {
            if url.trim().is_empty() {
                return Err("Custom endpoint URL cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Built-in provider endpoints, in priority order.
    ///
    /// The custom endpoint is not included; the fetcher prepends it.
    pub fn default_endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = vec![Endpoint::new(VATCOMPLY_URL)];
        if let Some(key) = &self.fxrates_api_key {
            endpoints.push(Endpoint::new(format!("{FXRATES_URL}?access_key={key}")));
        }
        endpoints
    }
}
