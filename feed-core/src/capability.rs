//! Capability and game definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of fetch operation a source may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Upcoming match schedule
    #[serde(rename = "upcoming")]
    FetchUpcoming,
    /// Completed match results
    #[serde(rename = "results")]
    FetchResults,
    /// Team rankings per region
    #[serde(rename = "rankings")]
    FetchRankings,
    /// Player statistics per region
    #[serde(rename = "player_stats")]
    FetchPlayerStats,
    /// Tournaments / events
    #[serde(rename = "events")]
    FetchEvents,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::FetchUpcoming,
        Capability::FetchResults,
        Capability::FetchRankings,
        Capability::FetchPlayerStats,
        Capability::FetchEvents,
    ];

    /// Identifier used in config files, cache keys and routes
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FetchUpcoming => "upcoming",
            Capability::FetchResults => "results",
            Capability::FetchRankings => "rankings",
            Capability::FetchPlayerStats => "player_stats",
            Capability::FetchEvents => "events",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upcoming" | "matches" => Ok(Capability::FetchUpcoming),
            "results" => Ok(Capability::FetchResults),
            "rankings" => Ok(Capability::FetchRankings),
            "player_stats" | "stats" | "players" => Ok(Capability::FetchPlayerStats),
            "events" => Ok(Capability::FetchEvents),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// Supported games
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Valorant,
    Cs2,
    #[serde(rename = "lol")]
    LeagueOfLegends,
    Dota2,
}

impl Game {
    /// Short identifier (config files, routes, cache keys)
    pub fn short_name(&self) -> &'static str {
        match self {
            Game::Valorant => "valorant",
            Game::Cs2 => "cs2",
            Game::LeagueOfLegends => "lol",
            Game::Dota2 => "dota2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Game::Valorant => "Valorant",
            Game::Cs2 => "Counter-Strike 2",
            Game::LeagueOfLegends => "League of Legends",
            Game::Dota2 => "Dota 2",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valorant" | "val" => Ok(Game::Valorant),
            "cs2" | "cs" | "csgo" => Ok(Game::Cs2),
            "lol" | "league" | "leagueoflegends" => Ok(Game::LeagueOfLegends),
            "dota2" | "dota" => Ok(Game::Dota2),
            _ => Err(format!("Unknown game: {}", s)),
        }
    }
}

/// Region codes understood by ranking and stats endpoints, with their long names
pub const REGIONS: &[(&str, &str)] = &[
    ("na", "north-america"),
    ("eu", "europe"),
    ("ap", "asia-pacific"),
    ("sa", "latin-america"),
    ("jp", "japan"),
    ("oce", "oceania"),
    ("mn", "mena"),
    ("kr", "korea"),
    ("br", "brazil"),
    ("cn", "china"),
    ("gc", "game-changers"),
    ("col", "collegiate"),
];

/// Look up the long name of a region code
pub fn region_name(code: &str) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_round_trips_through_identifier() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("odds".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_serde_names() {
        let json = serde_json::to_string(&Capability::FetchPlayerStats).unwrap();
        assert_eq!(json, "\"player_stats\"");
        let cap: Capability = serde_json::from_str("\"rankings\"").unwrap();
        assert_eq!(cap, Capability::FetchRankings);
    }

    #[test]
    fn test_game_aliases() {
        assert_eq!("VAL".parse::<Game>().unwrap(), Game::Valorant);
        assert_eq!("league".parse::<Game>().unwrap(), Game::LeagueOfLegends);
        let game: Game = serde_json::from_str("\"lol\"").unwrap();
        assert_eq!(game, Game::LeagueOfLegends);
    }

    #[test]
    fn test_region_lookup() {
        assert_eq!(region_name("EU"), Some("europe"));
        assert_eq!(region_name("xx"), None);
        assert_eq!(REGIONS.len(), 12);
    }
}
