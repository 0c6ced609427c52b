//! Upstream source adapters
//!
//! Two configurable adapters implement [`SourceClient`]: a REST/JSON client
//! and an HTML scraper. Sources are built from configuration through the
//! static [`SOURCE_FACTORIES`] table.

pub mod client;
pub mod config;
pub mod html_scrape;
pub mod http;
pub mod json_api;
pub mod registry;

pub use client::SourceClient;
pub use config::{RateLimitSettings, SourceConfig, SourcesFile};
pub use html_scrape::{FieldKind, FieldSelector, HtmlScrapeSource, PageTemplate};
pub use http::{build_client, HttpSettings};
pub use json_api::{EndpointTemplate, JsonApiSource};
pub use registry::{build_source, build_sources, registered_kinds, SourceRegistration, SOURCE_FACTORIES};
