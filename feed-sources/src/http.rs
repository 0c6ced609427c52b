//! Shared HTTP plumbing for the adapters
//!
//! Builds the outbound client, renders endpoint templates into URLs and maps
//! transport and status failures onto [`FetchError`] classes.

use std::collections::BTreeMap;
use std::time::Duration;

use feed_core::{ConfigError, FetchError, FetchParams};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Browser user agent; several upstream sites reject obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Largest slice of an error body kept in a failure message
const MAX_ERROR_BODY: usize = 200;

/// Outbound HTTP settings shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Build the HTTP client shared by all sources
pub fn build_client(settings: &HttpSettings) -> Result<Client, ConfigError> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .build()
        .map_err(|e| ConfigError::InvalidValue {
            field: "http".to_string(),
            message: e.to_string(),
        })
}

/// Classify a transport-level failure
pub fn classify_send_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::network(format!("request timed out: {}", error))
    } else if error.is_connect() {
        FetchError::network(format!("connect failed: {}", error))
    } else {
        FetchError::network(error.to_string())
    }
}

/// Turn non-success statuses into classified failures
pub async fn check_status(source_name: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(FetchError::rate_limited(source_name, retry_after));
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(FetchError::network(format!("HTTP {}: {}", status, body.trim())))
}

/// Replace `{name}` placeholders, or `None` if any placeholder has no value
pub fn render_template(template: &str, params: &FetchParams) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let value = params.placeholder(&after[..end])?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Build a request URL from a base URL, a path template and query templates
///
/// Query pairs whose placeholders have no value are left out; an unresolved
/// placeholder in the path is an error.
pub fn build_url(
    base_url: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    params: &FetchParams,
) -> Result<Url, FetchError> {
    let rendered_path = render_template(path, params).ok_or_else(|| {
        FetchError::invalid_params(format!("missing value for placeholder in path {}", path))
    })?;

    let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), rendered_path))
        .map_err(|e| FetchError::invalid_params(format!("invalid url: {}", e)))?;

    let pairs: Vec<(String, String)> = query
        .iter()
        .filter_map(|(k, v)| render_template(v, params).map(|v| (k.clone(), v)))
        .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

/// Validate a configured base URL
pub fn parse_base_url(source_name: &str, base_url: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidBaseUrl {
            source_name: source_name.to_string(),
            message: format!("unsupported scheme {}", other),
        }),
    }
}
