//! Server configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use feed_core::ConfigError;
use feed_services::{
    AcquisitionConfig, AggregatorConfig, CacheConfig, CacheTtls, EmptyResultPolicy,
    HealthMonitorConfig,
};

/// Runtime settings for the API server
///
/// Every field has a default, so an empty environment yields a working setup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server_port: u16,
    pub sources_config: String,
    /// `None` leaves the cache unbounded (`CACHE_MAX_SIZE=0`)
    pub cache_max_size: Option<usize>,
    pub fetch_timeout: Duration,
    pub probe_timeout: Duration,
    pub health_interval: Duration,
    pub cache_sweep_interval: Duration,
    pub prefer_non_empty: bool,
    pub serve_stale_on_timeout: bool,
    /// How long expired entries stay available as a timeout fallback
    pub stale_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            sources_config: "config/sources.json".to_string(),
            cache_max_size: Some(1000),
            fetch_timeout: Duration::from_millis(15_000),
            probe_timeout: Duration::from_secs(10),
            health_interval: Duration::from_secs(60),
            cache_sweep_interval: Duration::from_secs(60),
            prefer_non_empty: false,
            serve_stale_on_timeout: false,
            stale_grace: Duration::from_secs(3600),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_max_size = match lookup("CACHE_MAX_SIZE") {
            Some(raw) => match parse::<usize>("CACHE_MAX_SIZE", &raw)? {
                0 => None,
                n => Some(n),
            },
            None => defaults.cache_max_size,
        };

        let config = Self {
            server_port: var_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            sources_config: lookup("SOURCES_CONFIG")
                .filter(|path| !path.trim().is_empty())
                .unwrap_or(defaults.sources_config),
            cache_max_size,
            fetch_timeout: Duration::from_millis(var_or(&lookup, "FETCH_TIMEOUT_MS", 15_000)?),
            probe_timeout: Duration::from_secs(var_or(&lookup, "PROBE_TIMEOUT_SECS", 10)?),
            health_interval: Duration::from_secs(var_or(&lookup, "HEALTH_INTERVAL_SECS", 60)?),
            cache_sweep_interval: Duration::from_secs(var_or(&lookup, "CACHE_SWEEP_SECS", 60)?),
            prefer_non_empty: flag_or(&lookup, "PREFER_NON_EMPTY", defaults.prefer_non_empty)?,
            serve_stale_on_timeout: flag_or(
                &lookup,
                "SERVE_STALE_ON_TIMEOUT",
                defaults.serve_stale_on_timeout,
            )?,
            stale_grace: Duration::from_secs(var_or(&lookup, "CACHE_STALE_GRACE_SECS", 3600)?),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("FETCH_TIMEOUT_MS", self.fetch_timeout),
            ("PROBE_TIMEOUT_SECS", self.probe_timeout),
            ("HEALTH_INTERVAL_SECS", self.health_interval),
            ("CACHE_SWEEP_SECS", self.cache_sweep_interval),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size: self.cache_max_size,
            stale_grace: if self.serve_stale_on_timeout {
                self.stale_grace
            } else {
                Duration::ZERO
            },
            ..CacheConfig::default()
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            empty_result: if self.prefer_non_empty {
                EmptyResultPolicy::PreferNonEmpty
            } else {
                EmptyResultPolicy::AcceptEmpty
            },
        }
    }

    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            ttls: CacheTtls::default(),
            fetch_timeout: self.fetch_timeout,
            serve_stale_on_timeout: self.serve_stale_on_timeout,
        }
    }

    pub fn monitor_config(&self) -> HealthMonitorConfig {
        HealthMonitorConfig {
            probe_timeout: self.probe_timeout,
            ..HealthMonitorConfig::default()
        }
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        field: name.to_string(),
        message: format!("{:?}: {}", raw, e),
    })
}

fn var_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => parse(name, &raw),
        None => Ok(default),
    }
}

fn flag_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            message: format!("{:?} is not a boolean", raw),
        }),
    }
}
