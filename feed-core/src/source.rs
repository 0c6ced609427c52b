//! Source descriptors and fetch results

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, Game};

/// Static description of an upstream source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    /// Lower values are consulted first
    pub priority: u32,
    pub capabilities: BTreeSet<Capability>,
    pub games: BTreeSet<Game>,
    pub base_url: String,
    #[serde(default)]
    pub requires_auth: bool,
}

impl SourceDescriptor {
    pub fn supports(&self, capability: Capability, game: Game) -> bool {
        self.capabilities.contains(&capability) && self.games.contains(&game)
    }
}

/// A successful fetch with its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult<T> {
    pub payload: T,
    /// Source that produced the payload
    pub source_name: String,
    pub served_from_cache: bool,
    pub fetched_at: DateTime<Utc>,
}

impl<T> FetchResult<T> {
    pub fn fresh(payload: T, source_name: impl Into<String>) -> Self {
        Self {
            payload,
            source_name: source_name.into(),
            served_from_cache: false,
            fetched_at: Utc::now(),
        }
    }

    /// Same result, flagged as served from the cache
    pub fn from_cache(self) -> Self {
        Self {
            served_from_cache: true,
            ..self
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchResult<U> {
        FetchResult {
            payload: f(self.payload),
            source_name: self.source_name,
            served_from_cache: self.served_from_cache,
            fetched_at: self.fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_requires_both_game_and_capability() {
        let descriptor = SourceDescriptor {
            name: "vlr-api".to_string(),
            priority: 1,
            capabilities: [Capability::FetchUpcoming].into_iter().collect(),
            games: [Game::Valorant].into_iter().collect(),
            base_url: "https://vlrggapi.vercel.app".to_string(),
            requires_auth: false,
        };

        assert!(descriptor.supports(Capability::FetchUpcoming, Game::Valorant));
        assert!(!descriptor.supports(Capability::FetchResults, Game::Valorant));
        assert!(!descriptor.supports(Capability::FetchUpcoming, Game::Cs2));
    }

    #[test]
    fn test_from_cache_keeps_provenance() {
        let result = FetchResult::fresh(vec![1, 2], "B");
        let fetched_at = result.fetched_at;
        let cached = result.from_cache();

        assert!(cached.served_from_cache);
        assert_eq!(cached.source_name, "B");
        assert_eq!(cached.fetched_at, fetched_at);
        assert_eq!(cached.map(|p| p.len()).payload, 2);
    }
}
