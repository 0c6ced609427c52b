//! Static source registration table
//!
//! Maps the `kind` of a configured source to the factory that builds it.
//! Adding an adapter means adding a row here.

use std::sync::Arc;

use feed_core::ConfigError;
use reqwest::Client;
use tracing::{info, warn};

use crate::client::SourceClient;
use crate::config::SourceConfig;
use crate::html_scrape::HtmlScrapeSource;
use crate::json_api::JsonApiSource;

/// Builds a source from its configuration
pub type SourceFactory = fn(&SourceConfig, &Client) -> Result<Arc<dyn SourceClient>, ConfigError>;

/// One row of the registration table
pub struct SourceRegistration {
    pub kind: &'static str,
    pub build: SourceFactory,
}

/// Every adapter kind known to the workspace
pub const SOURCE_FACTORIES: &[SourceRegistration] = &[
    SourceRegistration {
        kind: JsonApiSource::KIND,
        build: build_json_api,
    },
    SourceRegistration {
        kind: HtmlScrapeSource::KIND,
        build: build_html_scrape,
    },
];

fn build_json_api(config: &SourceConfig, client: &Client) -> Result<Arc<dyn SourceClient>, ConfigError> {
    Ok(Arc::new(JsonApiSource::from_config(config, client.clone())?))
}

fn build_html_scrape(
    config: &SourceConfig,
    client: &Client,
) -> Result<Arc<dyn SourceClient>, ConfigError> {
    Ok(Arc::new(HtmlScrapeSource::from_config(config, client.clone())?))
}

pub fn registered_kinds() -> impl Iterator<Item = &'static str> {
    SOURCE_FACTORIES.iter().map(|r| r.kind)
}

/// Build one source, regardless of whether it is enabled
pub fn build_source(
    config: &SourceConfig,
    client: &Client,
) -> Result<Arc<dyn SourceClient>, ConfigError> {
    let registration = SOURCE_FACTORIES
        .iter()
        .find(|r| r.kind == config.kind)
        .ok_or_else(|| ConfigError::UnknownKind {
            source_name: config.name.clone(),
            kind: config.kind.clone(),
        })?;

    (registration.build)(config, client)
}

/// Build every enabled source
///
/// Sources that need a credential which is not set are skipped with a
/// warning; any other configuration problem is an error.
pub fn build_sources(
    configs: &[SourceConfig],
    client: &Client,
) -> Result<Vec<Arc<dyn SourceClient>>, ConfigError> {
    let mut sources = Vec::with_capacity(configs.len());

    for config in configs {
        if !config.enabled {
            info!("Source {} disabled in config", config.name);
            continue;
        }

        if let Some(var) = &config.api_key_env {
            if config.api_key().is_none() {
                warn!("Source {} disabled: {} not set", config.name, var);
                continue;
            }
        }

        let source = build_source(config, client)?;
        info!(
            "Registered source {} ({}, priority {}, {} capabilities)",
            config.name,
            config.kind,
            config.priority,
            source.descriptor().capabilities.len()
        );
        sources.push(source);
    }

    Ok(sources)
}
