//! Source configuration
//!
//! Everything site-specific (endpoints, selectors, limits) lives in the
//! sources file, never in code.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use feed_core::{Capability, ConfigError, Game, ProbeSpec, SourceDescriptor};
use serde::{Deserialize, Serialize};

use crate::http::HttpSettings;

/// Outbound request budget for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Minimum spacing between two requests
    #[serde(default)]
    pub min_interval_ms: Option<u64>,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            min_interval_ms: None,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval_ms.map(Duration::from_millis)
    }
}

/// One configured upstream source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Adapter kind, looked up in [`crate::SOURCE_FACTORIES`]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub priority: u32,
    pub games: BTreeSet<Game>,
    pub base_url: String,
    /// Environment variable holding the credential, if the source needs one
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Adapter-specific endpoint definition per capability
    #[serde(default)]
    pub endpoints: BTreeMap<Capability, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            name: self.name.clone(),
            priority: self.priority,
            capabilities: self.endpoints.keys().copied().collect(),
            games: self.games.clone(),
            base_url: self.base_url.clone(),
            requires_auth: self.api_key_env.is_some(),
        }
    }

    /// Credential read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Decode the endpoint definition for one capability into the adapter's type
    pub fn endpoint<T: serde::de::DeserializeOwned>(
        &self,
        capability: Capability,
        value: &serde_json::Value,
    ) -> Result<T, ConfigError> {
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidEndpoint {
            source_name: self.name.clone(),
            capability,
            message: e.to_string(),
        })
    }
}

/// Contents of the sources configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub health_endpoints: Vec<ProbeSpec>,
}

impl SourcesFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: SourcesFile =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidJson {
                field: "sources".to_string(),
                error: e.to_string(),
            })?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "sources".to_string(),
                    message: format!("duplicate source name {}", source.name),
                });
            }
            if source.rate_limit.max_requests == 0 || source.rate_limit.window_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.rate_limit", source.name),
                    message: "max_requests and window_secs must be greater than zero".to_string(),
                });
            }
        }

        // Health results are keyed by endpoint name
        let mut endpoints = BTreeSet::new();
        for endpoint in &self.health_endpoints {
            if !endpoints.insert(endpoint.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "health_endpoints".to_string(),
                    message: format!("duplicate endpoint name {}", endpoint.name),
                });
            }
        }
        Ok(())
    }
}
