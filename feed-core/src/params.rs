//! Fetch parameters

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, Game};

/// Filter parameters for a capability request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchParams {
    pub game: Game,
    /// Region code (see [`crate::REGIONS`])
    #[serde(default)]
    pub region: Option<String>,
    /// Player stats window in days
    #[serde(default)]
    pub timespan_days: Option<u32>,
    /// Result pages to fetch
    #[serde(default)]
    pub num_pages: Option<u32>,
    #[serde(default = "default_true")]
    pub include_upcoming: bool,
    #[serde(default)]
    pub include_completed: bool,
}

fn default_true() -> bool {
    true
}

impl FetchParams {
    pub fn new(game: Game) -> Self {
        Self {
            game,
            region: None,
            timespan_days: None,
            num_pages: None,
            include_upcoming: true,
            include_completed: false,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into().to_lowercase());
        self
    }

    pub fn with_timespan_days(mut self, days: u32) -> Self {
        self.timespan_days = Some(days);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.num_pages = Some(pages);
        self
    }

    pub fn with_event_status(mut self, upcoming: bool, completed: bool) -> Self {
        self.include_upcoming = upcoming;
        self.include_completed = completed;
        self
    }

    /// Canonical cache key for this request
    ///
    /// Fields are written in a fixed order so equal requests always map to
    /// the same key.
    pub fn cache_key(&self, capability: Capability) -> String {
        format!(
            "{}:{}:region={}:timespan={}:pages={}:upcoming={}:completed={}",
            capability.as_str(),
            self.game.short_name(),
            self.region.as_deref().unwrap_or("-"),
            self.timespan_days.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            self.num_pages.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            self.include_upcoming,
            self.include_completed,
        )
    }

    /// Value substituted for a `{name}` placeholder in endpoint templates
    pub fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "game" => Some(self.game.short_name().to_string()),
            "region" => self.region.clone(),
            "timespan" => self.timespan_days.map(|d| d.to_string()),
            "num_pages" | "pages" => self.num_pages.map(|p| p.to_string()),
            "status" => Some(
                match (self.include_upcoming, self.include_completed) {
                    (true, false) => "upcoming",
                    (false, true) => "completed",
                    _ => "all",
                }
                .to_string(),
            ),
            _ => None,
        }
    }
}
