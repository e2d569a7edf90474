//! Configuration management for the Homey MCP server
//!
//! Everything is read from `HOMEY_*` environment variables. Loading is
//! lenient; [`ServerConfig::validate`] enforces the credential and bound
//! checks so an offline start can skip them.

use crate::error::{HomeyError, Result};
use crate::error_recovery::{CircuitBreakerConfig, RetryPolicy};
use crate::utils::pagination::CursorCodec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::{env, time::Duration};
use url::Url;

/// Minimum accepted length of a hub API token
pub const MIN_TOKEN_LENGTH: usize = 10;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Hub connection settings
    pub hub: HubConfig,

    /// Page size limits for list tools
    pub pagination: PaginationConfig,

    /// Resource cache lifetimes
    pub cache: CacheConfig,

    /// Breaker settings shared by every named breaker
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings for hub calls
    pub retry: RetryPolicy,

    /// Which tools are exposed
    pub tools: ToolFilter,

    /// Log level name (`INFO`, `DEBUG`, ...)
    pub log_level: String,
}

/// HomeyPro connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Hub base URL (e.g. "http://192.168.1.100")
    pub api_url: Option<Url>,

    /// Personal access token
    #[serde(skip_serializing)]
    pub api_token: String,

    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Verify TLS certificates
    pub verify_ssl: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: String::new(),
            timeout: Duration::from_secs(30),
            verify_ssl: false,
        }
    }
}

/// Pagination bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    pub fn codec(&self) -> CursorCodec {
        CursorCodec::new(self.default_page_size, self.max_page_size)
    }
}

/// Cache lifetimes per resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// General TTL reported in diagnostics (`HOMEY_CACHE_TTL`)
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub system_overview_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub device_registry_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub zone_hierarchy_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub flow_catalog_ttl: Duration,
    /// How long a health check result is reused
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            system_overview_ttl: Duration::from_secs(300),
            device_registry_ttl: Duration::from_secs(30),
            zone_hierarchy_ttl: Duration::from_secs(300),
            flow_catalog_ttl: Duration::from_secs(120),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

/// Tool allow/deny lists. An allow list, when present, wins over the deny
/// list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFilter {
    pub enabled: Option<BTreeSet<String>>,
    pub disabled: BTreeSet<String>,
}

impl ToolFilter {
    /// Build from the raw comma-separated env values
    pub fn from_lists(enabled: Option<&str>, disabled: Option<&str>) -> Self {
        let enabled = enabled.map(parse_tool_list).filter(|set| !set.is_empty());
        let disabled = disabled.map(parse_tool_list).unwrap_or_default();
        Self { enabled, disabled }
    }

    pub fn is_enabled(&self, tool: &str) -> bool {
        match &self.enabled {
            Some(enabled) => enabled.contains(tool),
            None => !self.disabled.contains(tool),
        }
    }
}

fn parse_tool_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| HomeyError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("HOMEY_API_URL") {
            config.hub.api_url = Some(Url::parse(raw.trim()).map_err(|_| {
                HomeyError::config(format!(
                    "Invalid API URL format: {raw}. Expected format: http://192.168.1.100"
                ))
            })?);
        }

        if let Ok(token) = env::var("HOMEY_API_TOKEN") {
            config.hub.api_token = token;
        }

        if let Some(secs) = env_parse::<f64>("HOMEY_TIMEOUT")? {
            config.hub.timeout = Duration::try_from_secs_f64(secs)
                .map_err(|e| HomeyError::config(format!("Invalid HOMEY_TIMEOUT: {e}")))?;
        }

        if let Ok(verify) = env::var("HOMEY_VERIFY_SSL") {
            config.hub.verify_ssl = verify.trim().eq_ignore_ascii_case("true");
        }

        if let Some(secs) = env_parse::<u64>("HOMEY_CACHE_TTL")? {
            config.cache.default_ttl = Duration::from_secs(secs);
        }

        if let Some(max) = env_parse("HOMEY_MAX_PAGE_SIZE")? {
            config.pagination.max_page_size = max;
        }

        if let Some(default) = env_parse("HOMEY_DEFAULT_PAGE_SIZE")? {
            config.pagination.default_page_size = default;
        }

        config.tools = ToolFilter::from_lists(
            env::var("HOMEY_ENABLED_TOOLS").ok().as_deref(),
            env::var("HOMEY_DISABLED_TOOLS").ok().as_deref(),
        );

        config.log_level = env::var("HOMEY_LOG_LEVEL")
            .map(|level| level.trim().to_uppercase())
            .unwrap_or_else(|_| "INFO".to_string());

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = self
            .hub
            .api_url
            .as_ref()
            .ok_or_else(|| HomeyError::config("HOMEY_API_URL environment variable is required"))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(HomeyError::config(format!(
                "Invalid API URL format: {url}. Expected format: http://192.168.1.100"
            )));
        }

        if self.hub.api_token.trim().len() < MIN_TOKEN_LENGTH {
            return Err(HomeyError::config(
                "API token must be provided and at least 10 characters long",
            ));
        }

        if self.pagination.max_page_size == 0 {
            return Err(HomeyError::config("Max page size must be at least 1"));
        }

        if !(1..=self.pagination.max_page_size).contains(&self.pagination.default_page_size) {
            return Err(HomeyError::config(format!(
                "Default page size must be between 1 and {}",
                self.pagination.max_page_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: [&str; 10] = [
        "HOMEY_API_URL",
        "HOMEY_API_TOKEN",
        "HOMEY_TIMEOUT",
        "HOMEY_VERIFY_SSL",
        "HOMEY_CACHE_TTL",
        "HOMEY_MAX_PAGE_SIZE",
        "HOMEY_DEFAULT_PAGE_SIZE",
        "HOMEY_ENABLED_TOOLS",
        "HOMEY_DISABLED_TOOLS",
        "HOMEY_LOG_LEVEL",
    ];

    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let kvs: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(kvs, f)
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_env(
            &[
                ("HOMEY_API_URL", "http://192.168.1.100"),
                ("HOMEY_API_TOKEN", "abcdefghijklmnop"),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                config.validate().unwrap();
                assert_eq!(config.hub.timeout, Duration::from_secs(30));
                assert!(!config.hub.verify_ssl);
                assert_eq!(config.pagination, PaginationConfig::default());
                assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
                assert_eq!(config.log_level, "INFO");
                assert!(config.tools.is_enabled("list_devices"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_overrides() {
        with_env(
            &[
                ("HOMEY_API_URL", "https://homey.local"),
                ("HOMEY_API_TOKEN", "abcdefghijklmnop"),
                ("HOMEY_TIMEOUT", "12.5"),
                ("HOMEY_VERIFY_SSL", "TRUE"),
                ("HOMEY_MAX_PAGE_SIZE", "40"),
                ("HOMEY_DEFAULT_PAGE_SIZE", "10"),
                ("HOMEY_LOG_LEVEL", "debug"),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.hub.timeout, Duration::from_millis(12_500));
                assert!(config.hub.verify_ssl);
                assert_eq!(config.pagination.max_page_size, 40);
                assert_eq!(config.pagination.default_page_size, 10);
                assert_eq!(config.log_level, "DEBUG");
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_url_fails_validation() {
        with_env(&[("HOMEY_API_TOKEN", "abcdefghijklmnop")], || {
            let err = ServerConfig::from_env().unwrap().validate().unwrap_err();
            assert!(err.to_string().contains("HOMEY_API_URL"));
        });
    }

    #[test]
    #[serial]
    fn test_url_without_scheme_is_rejected() {
        with_env(&[("HOMEY_API_URL", "192.168.1.100")], || {
            assert!(matches!(ServerConfig::from_env(), Err(HomeyError::Config(_))));
        });
    }

    #[test]
    #[serial]
    fn test_short_token_fails_validation() {
        with_env(
            &[("HOMEY_API_URL", "http://homey.local"), ("HOMEY_API_TOKEN", "short")],
            || {
                let err = ServerConfig::from_env().unwrap().validate().unwrap_err();
                assert!(err.to_string().contains("at least 10 characters"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_bad_number_is_reported() {
        with_env(&[("HOMEY_MAX_PAGE_SIZE", "lots")], || {
            let err = ServerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("HOMEY_MAX_PAGE_SIZE"));
        });
    }

    #[test]
    fn test_default_page_size_must_fit_max() {
        let mut config = ServerConfig::default();
        config.hub.api_url = Some(Url::parse("http://homey.local").unwrap());
        config.hub.api_token = "abcdefghijklmnop".to_string();
        config.pagination = PaginationConfig {
            default_page_size: 50,
            max_page_size: 20,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_list_wins_over_disabled() {
        let filter = ToolFilter::from_lists(Some("list_devices, get_device"), Some("list_devices"));
        assert!(filter.is_enabled("list_devices"));
        assert!(filter.is_enabled("get_device"));
        assert!(!filter.is_enabled("trigger_flow"));
    }

    #[test]
    fn test_disabled_list() {
        let filter = ToolFilter::from_lists(Some("  "), Some("control_device,trigger_flow"));
        assert!(filter.enabled.is_none());
        assert!(!filter.is_enabled("control_device"));
        assert!(filter.is_enabled("list_zones"));
    }
}
