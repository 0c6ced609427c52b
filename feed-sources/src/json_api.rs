//! REST/JSON source adapter
//!
//! Each capability maps to an endpoint template: a path, query pairs with
//! `{placeholder}` values and a JSON pointer to the array of records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use feed_core::{Capability, ConfigError, FetchError, FetchParams, Payload, SourceDescriptor};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::{decode_records, ensure_supported, SourceClient};
use crate::config::SourceConfig;
use crate::http::{build_url, check_status, classify_send_error, parse_base_url};

/// Where and how to fetch one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// JSON pointer to the record array; empty means the document root
    #[serde(default)]
    pub records_pointer: String,
}

/// JSON API client
pub struct JsonApiSource {
    descriptor: SourceDescriptor,
    client: Client,
    endpoints: BTreeMap<Capability, EndpointTemplate>,
    api_key: Option<String>,
}

impl JsonApiSource {
    pub const KIND: &'static str = "json_api";

    pub fn new(
        descriptor: SourceDescriptor,
        client: Client,
        endpoints: BTreeMap<Capability, EndpointTemplate>,
        api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        parse_base_url(&descriptor.name, &descriptor.base_url)?;

        for (capability, endpoint) in &endpoints {
            if !endpoint.records_pointer.is_empty() && !endpoint.records_pointer.starts_with('/') {
                return Err(ConfigError::InvalidEndpoint {
                    source_name: descriptor.name.clone(),
                    capability: *capability,
                    message: format!(
                        "records_pointer must be empty or start with '/': {}",
                        endpoint.records_pointer
                    ),
                });
            }
        }

        Ok(Self {
            descriptor,
            client,
            endpoints,
            api_key,
        })
    }

    pub fn from_config(config: &SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|(capability, raw)| Ok((*capability, config.endpoint(*capability, raw)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Self::new(config.descriptor(), client, endpoints, config.api_key())
    }

    async fn get_json(&self, endpoint: &EndpointTemplate, params: &FetchParams) -> Result<Value, FetchError> {
        let url = build_url(&self.descriptor.base_url, &endpoint.path, &endpoint.query, params)?;
        debug!("Fetching {} from: {}", self.descriptor.name, url);

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_send_error)?;
        let response = check_status(&self.descriptor.name, response).await?;

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::parse(format!("response is not valid JSON: {}", e)))
    }
}

#[async_trait]
impl SourceClient for JsonApiSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self), fields(source = %self.descriptor.name))]
    async fn fetch(
        &self,
        capability: Capability,
        params: &FetchParams,
    ) -> Result<Payload, FetchError> {
        ensure_supported(&self.descriptor, capability, params)?;
        let endpoint = self
            .endpoints
            .get(&capability)
            .ok_or(FetchError::Unsupported(capability))?;

        let body = self.get_json(endpoint, params).await?;
        extract_records(&self.descriptor.name, capability, body, &endpoint.records_pointer)
    }
}

/// Pull the record array out of a response document and decode it
fn extract_records(
    source_name: &str,
    capability: Capability,
    mut body: Value,
    pointer: &str,
) -> Result<Payload, FetchError> {
    let records = match body.pointer_mut(pointer).map(Value::take) {
        Some(Value::Array(records)) => records,
        Some(Value::Null) | None => {
            return Err(FetchError::parse(format!(
                "records not found at '{}'",
                pointer
            )))
        }
        Some(other) => {
            return Err(FetchError::parse(format!(
                "expected an array at '{}', found {}",
                pointer,
                json_type(&other)
            )))
        }
    };

    decode_records(source_name, capability, records)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
