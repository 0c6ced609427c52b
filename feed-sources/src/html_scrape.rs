//! HTML scraping source adapter
//!
//! Pages are described entirely by configuration: an item selector, an
//! optional container that must exist on the page, and a selector per record
//! field. Extracted fields are assembled into JSON objects and decoded with
//! the same lenient record types the JSON adapter uses.

use std::collections::BTreeMap;

use async_trait::async_trait;
use feed_core::{Capability, ConfigError, FetchError, FetchParams, Payload, SourceDescriptor};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::client::{decode_records, ensure_supported, SourceClient};
use crate::config::SourceConfig;
use crate::http::{build_url, check_status, classify_send_error, parse_base_url};

/// How an extracted string becomes a JSON value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Integer,
    Float,
    /// Every match of the selector, as an array of strings
    List,
}

/// Extraction rule for one record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    /// Relative to the item element; absent means the item itself
    #[serde(default)]
    pub selector: Option<String>,
    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    /// Resolve the value against the page URL
    #[serde(default)]
    pub absolute_url: bool,
    /// Which match of the selector to use
    #[serde(default)]
    pub index: usize,
}

/// Where and how to scrape one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTemplate {
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub item_selector: String,
    /// Element that must be present; its absence means the layout changed
    #[serde(default)]
    pub container_selector: Option<String>,
    pub fields: BTreeMap<String, FieldSelector>,
    #[serde(default)]
    pub max_items: Option<usize>,
}

struct CompiledField {
    name: String,
    selector: Option<Selector>,
    rule: FieldSelector,
}

struct CompiledPage {
    template: PageTemplate,
    item: Selector,
    container: Option<Selector>,
    fields: Vec<CompiledField>,
}

impl CompiledPage {
    fn compile(
        source_name: &str,
        capability: Capability,
        template: PageTemplate,
    ) -> Result<Self, ConfigError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ConfigError::InvalidEndpoint {
                source_name: source_name.to_string(),
                capability,
                message: format!("invalid selector '{}': {}", css, e),
            })
        };

        if template.fields.is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                source_name: source_name.to_string(),
                capability,
                message: "page template defines no fields".to_string(),
            });
        }

        let item = parse(&template.item_selector)?;
        let container = template.container_selector.as_deref().map(parse).transpose()?;
        let fields = template
            .fields
            .iter()
            .map(|(name, rule)| {
                Ok(CompiledField {
                    name: name.clone(),
                    selector: rule.selector.as_deref().map(parse).transpose()?,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            template,
            item,
            container,
            fields,
        })
    }
}

/// HTML scraping client
pub struct HtmlScrapeSource {
    descriptor: SourceDescriptor,
    client: Client,
    pages: BTreeMap<Capability, CompiledPage>,
}

impl HtmlScrapeSource {
    pub const KIND: &'static str = "html_scrape";

    /// Create a scraper; every selector is compiled up front
    pub fn new(
        descriptor: SourceDescriptor,
        client: Client,
        pages: BTreeMap<Capability, PageTemplate>,
    ) -> Result<Self, ConfigError> {
        parse_base_url(&descriptor.name, &descriptor.base_url)?;

        let pages = pages
            .into_iter()
            .map(|(capability, template)| {
                Ok((
                    capability,
                    CompiledPage::compile(&descriptor.name, capability, template)?,
                ))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(Self {
            descriptor,
            client,
            pages,
        })
    }

    pub fn from_config(config: &SourceConfig, client: Client) -> Result<Self, ConfigError> {
        let pages = config
            .endpoints
            .iter()
            .map(|(capability, raw)| Ok((*capability, config.endpoint(*capability, raw)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Self::new(config.descriptor(), client, pages)
    }

    async fn get_page(&self, url: Url) -> Result<String, FetchError> {
        debug!("Scraping {} page: {}", self.descriptor.name, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_send_error)?;
        let response = check_status(&self.descriptor.name, response).await?;

        response
            .text()
            .await
            .map_err(|e| FetchError::network(format!("failed to read page body: {}", e)))
    }
}

#[async_trait]
impl SourceClient for HtmlScrapeSource {
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
        let page = self
            .pages
            .get(&capability)
            .ok_or(FetchError::Unsupported(capability))?;

        let url = build_url(
            &self.descriptor.base_url,
            &page.template.path,
            &page.template.query,
            params,
        )?;
        let html = self.get_page(url.clone()).await?;

        let items = extract_items(page, &html, &url)?;
        decode_records(&self.descriptor.name, capability, items)
    }
}

/// Run a page template over a document
///
/// Kept synchronous: `Html` is not `Send` and must never live across an await.
fn extract_items(page: &CompiledPage, html: &str, page_url: &Url) -> Result<Vec<Value>, FetchError> {
    let document = Html::parse_document(html);

    let items: Vec<ElementRef> = match &page.container {
        Some(container) => {
            let root = document.select(container).next().ok_or_else(|| {
                FetchError::parse(format!(
                    "page structure changed: '{}' not found",
                    page.template.container_selector.as_deref().unwrap_or_default()
                ))
            })?;
            root.select(&page.item).collect()
        }
        None => document.select(&page.item).collect(),
    };

    let limit = page.template.max_items.unwrap_or(usize::MAX);
    let records = items
        .into_iter()
        .take(limit)
        .filter_map(|item| {
            let record: Map<String, Value> = page
                .fields
                .iter()
                .filter_map(|field| {
                    field_value(item, field, page_url).map(|value| (field.name.clone(), value))
                })
                .collect();
            (!record.is_empty()).then_some(Value::Object(record))
        })
        .collect();

    Ok(records)
}

fn field_value(item: ElementRef, field: &CompiledField, page_url: &Url) -> Option<Value> {
    let targets: Vec<ElementRef> = match &field.selector {
        Some(selector) => item.select(selector).collect(),
        None => vec![item],
    };

    if field.rule.kind == FieldKind::List {
        let values: Vec<Value> = targets
            .into_iter()
            .filter_map(|el| raw_value(el, &field.rule, page_url))
            .map(Value::String)
            .collect();
        return (!values.is_empty()).then_some(Value::Array(values));
    }

    let target = targets.into_iter().nth(field.rule.index)?;
    let raw = raw_value(target, &field.rule, page_url)?;

    match field.rule.kind {
        FieldKind::Integer => parse_integer(&raw).map(|n| Value::Number(n.into())),
        FieldKind::Float => parse_float(&raw).and_then(Number::from_f64).map(Value::Number),
        FieldKind::Text | FieldKind::List => Some(Value::String(raw)),
    }
}

fn raw_value(element: ElementRef, rule: &FieldSelector, page_url: &Url) -> Option<String> {
    let raw = match &rule.attr {
        Some(attr) => element.value().attr(attr)?.trim().to_string(),
        None => element.text().collect::<Vec<_>>().join(" "),
    };
    let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if raw.is_empty() {
        return None;
    }

    if rule.absolute_url {
        return page_url.join(&raw).ok().map(String::from);
    }
    Some(raw)
}

/// Digits of a ranking or score cell, e.g. "#12" or "1,024"
fn parse_integer(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    if raw.trim_start().starts_with('-') {
        Some(-value)
    } else {
        Some(value)
    }
}

/// A rating or percentage cell, e.g. "1.12" or "28%"
fn parse_float(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .replace(',', "")
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::{Html as HtmlBody, IntoResponse};
    use axum::routing::get;
    use axum::Router;
    use feed_core::Game;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="wf-card">
            <a class="match-item" href="/353177/sentinels-vs-loud">
              <div class="match-item-vs-team-name"> Sentinels </div>
              <div class="match-item-vs-team-score">2</div>
              <div class="match-item-vs-team-name">LOUD</div>
              <div class="match-item-vs-team-score">1</div>
              <div class="match-item-event">VCT Americas <span>Upper Final</span></div>
            </a>
            <a class="match-item" href="/353178/fnatic-vs-th">
              <div class="match-item-vs-team-name">FNATIC</div>
              <div class="match-item-vs-team-score">–</div>
              <div class="match-item-vs-team-name">Team Heretics</div>
              <div class="match-item-vs-team-score">0</div>
            </a>
            <a class="match-item" href="/broken"><span>TBD</span></a>
          </div>
        </body></html>
    "#;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn field(selector: Option<&str>, kind: FieldKind, index: usize) -> FieldSelector {
        FieldSelector {
            selector: selector.map(str::to_string),
            attr: None,
            kind,
            absolute_url: false,
            index,
        }
    }

    fn results_template(container: Option<&str>) -> PageTemplate {
        let mut fields = BTreeMap::new();
        fields.insert(
            "team1".to_string(),
            field(Some(".match-item-vs-team-name"), FieldKind::Text, 0),
        );
        fields.insert(
            "team2".to_string(),
            field(Some(".match-item-vs-team-name"), FieldKind::Text, 1),
        );
        fields.insert(
            "score1".to_string(),
            field(Some(".match-item-vs-team-score"), FieldKind::Integer, 0),
        );
        fields.insert(
            "score2".to_string(),
            field(Some(".match-item-vs-team-score"), FieldKind::Integer, 1),
        );
        fields.insert(
            "match_event".to_string(),
            field(Some(".match-item-event"), FieldKind::Text, 0),
        );
        fields.insert(
            "match_page".to_string(),
            FieldSelector {
                selector: None,
                attr: Some("href".to_string()),
                kind: FieldKind::Text,
                absolute_url: true,
                index: 0,
            },
        );

        PageTemplate {
            path: "/matches/results".to_string(),
            query: BTreeMap::new(),
            item_selector: "a.match-item".to_string(),
            container_selector: container.map(str::to_string),
            fields,
            max_items: None,
        }
    }

    fn scraper(base_url: String, template: PageTemplate) -> HtmlScrapeSource {
        let descriptor = SourceDescriptor {
            name: "vlr-scrape".to_string(),
            priority: 2,
            capabilities: [Capability::FetchResults].into_iter().collect(),
            games: [Game::Valorant].into_iter().collect(),
            base_url,
            requires_auth: false,
        };
        HtmlScrapeSource::new(
            descriptor,
            Client::new(),
            [(Capability::FetchResults, template)].into_iter().collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_scrape_results_page() {
        let app = Router::new().route("/matches/results", get(|| async { HtmlBody(RESULTS_PAGE) }));
        let base = serve(app).await;
        let source = scraper(base.clone(), results_template(Some("div.wf-card")));

        let results = source
            .fetch_results(&FetchParams::new(Game::Valorant))
            .await
            .unwrap();

        // The third item has no team names and is skipped
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].team1, "Sentinels");
        assert_eq!(results[0].team2, "LOUD");
        assert_eq!(results[0].score1, Some(2));
        assert_eq!(results[0].winner(), Some("Sentinels"));
        assert_eq!(results[0].match_event, "VCT Americas Upper Final");
        assert_eq!(
            results[0].match_page,
            format!("{}/353177/sentinels-vs-loud", base)
        );
        assert_eq!(results[1].score1, None);
        assert_eq!(results[1].score2, Some(0));
    }

    #[tokio::test]
    async fn test_missing_container_is_parse_failure() {
        let app = Router::new().route(
            "/matches/results",
            get(|| async { HtmlBody("<html><body><p>We moved!</p></body></html>") }),
        );
        let base = serve(app).await;
        let source = scraper(base, results_template(Some("div.wf-card")));

        let err = source
            .fetch(Capability::FetchResults, &FetchParams::new(Game::Valorant))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_no_items_is_empty_success() {
        let app = Router::new().route(
            "/matches/results",
            get(|| async { HtmlBody("<html><body><div class=\"wf-card\"></div></body></html>") }),
        );
        let base = serve(app).await;
        let source = scraper(base, results_template(Some("div.wf-card")));

        let payload = source
            .fetch(Capability::FetchResults, &FetchParams::new(Game::Valorant))
            .await
            .unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_every_item_invalid_is_parse_failure() {
        let app = Router::new().route(
            "/matches/results",
            get(|| async {
                HtmlBody(r#"<a class="match-item" href="/x"><span>TBD</span></a>"#)
            }),
        );
        let base = serve(app).await;
        let source = scraper(base, results_template(None));

        let err = source
            .fetch(Capability::FetchResults, &FetchParams::new(Game::Valorant))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_not_found_is_network_failure() {
        let app = Router::new().route(
            "/other",
            get(|| async { StatusCode::OK.into_response() }),
        );
        let base = serve(app).await;
        let source = scraper(base, results_template(None));

        let err = source
            .fetch(Capability::FetchResults, &FetchParams::new(Game::Valorant))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "{:?}", err);
    }

    #[test]
    fn test_max_items_and_list_fields() {
        let html = r#"
            <table><tbody>
              <tr><td class="p">TenZ</td><td class="a"><img alt="jett"><img alt="raze"></td><td class="r">1.12</td></tr>
              <tr><td class="p">aspas</td><td class="a"><img alt="jett"></td><td class="r">1.30</td></tr>
            </tbody></table>
        "#;
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), field(Some("td.p"), FieldKind::Text, 0));
        fields.insert(
            "agents".to_string(),
            FieldSelector {
                selector: Some("td.a img".to_string()),
                attr: Some("alt".to_string()),
                kind: FieldKind::List,
                absolute_url: false,
                index: 0,
            },
        );
        fields.insert("rating".to_string(), field(Some("td.r"), FieldKind::Float, 0));

        let template = PageTemplate {
            path: "/stats".to_string(),
            query: BTreeMap::new(),
            item_selector: "tbody tr".to_string(),
            container_selector: None,
            fields,
            max_items: Some(1),
        };
        let page = CompiledPage::compile("vlr", Capability::FetchPlayerStats, template).unwrap();
        let url = Url::parse("https://www.vlr.gg/stats").unwrap();

        let items = extract_items(&page, html, &url).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0],
            serde_json::json!({"name": "TenZ", "agents": ["jett", "raze"], "rating": 1.12})
        );
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut template = results_template(None);
        template.item_selector = "a..match-item[".to_string();
        let result = CompiledPage::compile("vlr", Capability::FetchResults, template);
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_numeric_cells() {
        assert_eq!(parse_integer("#12"), Some(12));
        assert_eq!(parse_integer("1,024"), Some(1024));
        assert_eq!(parse_integer("–"), None);
        assert_eq!(parse_float("28%"), Some(28.0));
        assert_eq!(parse_float("n/a"), None);
    }
}
