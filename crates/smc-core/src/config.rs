//! Upstream connection configuration

use crate::credential::Credential;
use crate::error::{Result, SmcError};
use std::time::Duration;
use url::Url;

/// Request timeout used when none is given
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Validated settings for one upstream server
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL without trailing slash
    pub plugin_url: String,
    pub api_key: Credential,
    pub request_timeout: Duration,
}

impl BridgeConfig {
    /// Validate raw values, as read from flags or the environment
    pub fn new(plugin_url: &str, api_key: &str, request_timeout_secs: u64) -> Result<Self> {
        let plugin_url =
            normalize_base_url(plugin_url).map_err(|e| SmcError::Config(e.to_string()))?;

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SmcError::Config("api_key cannot be empty".into()));
        }

        Ok(Self {
            plugin_url,
            api_key: Credential::new(api_key),
            request_timeout: timeout_from_secs(request_timeout_secs)?,
        })
    }
}

/// Convert a timeout in whole seconds, rejecting zero
pub fn timeout_from_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(SmcError::Config("request_timeout must be positive".into()));
    }
    Ok(Duration::from_secs(secs))
}

/// Check that `raw` is an absolute http(s) URL and strip trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SmcError::InvalidArgument("plugin_api_url cannot be empty".into()));
    }

    let parsed = Url::parse(trimmed).map_err(|e| {
        SmcError::InvalidArgument(format!("Invalid plugin_api_url '{}': {}", trimmed, e))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SmcError::InvalidArgument(
            "plugin_api_url must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(SmcError::InvalidArgument(
            "plugin_api_url must include a host".into(),
        ));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_stripped() {
        assert_eq!(
            normalize_base_url("http://localhost:8080/").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_base_url("  https://mc.example.com//  ").unwrap(),
            "https://mc.example.com"
        );
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        let err = normalize_base_url("ftp://localhost:8080").unwrap_err();
        assert!(err.to_string().contains("http:// or https://"));
        assert!(normalize_base_url("localhost:8080").is_err());
        assert!(normalize_base_url("").is_err());
    }

    #[test]
    fn test_bridge_config_validation() {
        let config = BridgeConfig::new("http://localhost:8080/", "  key-123  ", 5).unwrap();
        assert_eq!(config.plugin_url, "http://localhost:8080");
        assert_eq!(config.api_key.expose(), "key-123");
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        assert!(BridgeConfig::new("http://localhost:8080", "   ", 5).is_err());
        let err = BridgeConfig::new("ftp://localhost", "key", 5).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(BridgeConfig::new("http://localhost:8080", "key", 0).is_err());
    }
}
