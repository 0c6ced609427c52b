//! Typed records produced by sources
//!
//! Upstream APIs are inconsistent about types (scores and ratings are often
//! sent as strings), so numeric fields decode leniently.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Capability;

/// An upcoming match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingMatch {
    pub team1: String,
    pub team2: String,
    #[serde(default)]
    pub flag1: String,
    #[serde(default)]
    pub flag2: String,
    #[serde(default)]
    pub time_until_match: String,
    /// Stage within the event, e.g. "Upper Final"
    #[serde(default)]
    pub match_series: String,
    #[serde(default)]
    pub match_event: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unix_timestamp: Option<String>,
    #[serde(default)]
    pub match_page: String,
}

/// A completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub team1: String,
    pub team2: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub score1: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub score2: Option<u32>,
    #[serde(default)]
    pub flag1: String,
    #[serde(default)]
    pub flag2: String,
    #[serde(default)]
    pub time_completed: String,
    #[serde(default)]
    pub match_series: String,
    #[serde(default)]
    pub match_event: String,
    #[serde(default)]
    pub match_page: String,
}

impl MatchResult {
    /// Winner's name, if both scores are known and differ
    pub fn winner(&self) -> Option<&str> {
        match (self.score1, self.score2) {
            (Some(a), Some(b)) if a > b => Some(&self.team1),
            (Some(a), Some(b)) if b > a => Some(&self.team2),
            _ => None,
        }
    }
}

/// A ranked team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRanking {
    #[serde(alias = "team")]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub rank: Option<u32>,
    #[serde(default)]
    pub logo: Option<String>,
    /// Win-loss record, e.g. "15-5"
    #[serde(default)]
    pub record: Option<String>,
    #[serde(default)]
    pub earnings: Option<String>,
}

/// Player performance over a time span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(alias = "player")]
    pub name: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    /// Average combat score
    #[serde(default, alias = "average_combat_score", deserialize_with = "lenient_f64")]
    pub acs: Option<f64>,
    #[serde(default, alias = "kill_deaths", deserialize_with = "lenient_f64")]
    pub kd: Option<f64>,
    #[serde(default, alias = "kill_assists_survived_traded")]
    pub kast: Option<String>,
    /// Average damage per round
    #[serde(default, alias = "average_damage_per_round", deserialize_with = "lenient_f64")]
    pub adr: Option<f64>,
    #[serde(default, alias = "kills_per_round", deserialize_with = "lenient_f64")]
    pub kpr: Option<f64>,
    #[serde(default, alias = "assists_per_round", deserialize_with = "lenient_f64")]
    pub apr: Option<f64>,
    #[serde(default, alias = "first_kills_per_round", deserialize_with = "lenient_f64")]
    pub fkpr: Option<f64>,
    #[serde(default, alias = "first_deaths_per_round", deserialize_with = "lenient_f64")]
    pub fdpr: Option<f64>,
    #[serde(default, alias = "headshot_percentage")]
    pub hs_percent: Option<String>,
    #[serde(default, alias = "clutch_success_percentage")]
    pub clutch_percent: Option<String>,
}

/// A tournament or event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    /// "upcoming", "ongoing" or "completed"
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub prize: Option<String>,
    #[serde(default)]
    pub dates: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub url_path: String,
}

/// Records returned for one capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum Payload {
    Upcoming(Vec<UpcomingMatch>),
    Results(Vec<MatchResult>),
    Rankings(Vec<TeamRanking>),
    PlayerStats(Vec<PlayerStats>),
    Events(Vec<Event>),
}

impl Payload {
    /// An empty payload of the right shape for a capability
    pub fn empty(capability: Capability) -> Self {
        match capability {
            Capability::FetchUpcoming => Payload::Upcoming(Vec::new()),
            Capability::FetchResults => Payload::Results(Vec::new()),
            Capability::FetchRankings => Payload::Rankings(Vec::new()),
            Capability::FetchPlayerStats => Payload::PlayerStats(Vec::new()),
            Capability::FetchEvents => Payload::Events(Vec::new()),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Payload::Upcoming(_) => Capability::FetchUpcoming,
            Payload::Results(_) => Capability::FetchResults,
            Payload::Rankings(_) => Capability::FetchRankings,
            Payload::PlayerStats(_) => Capability::FetchPlayerStats,
            Payload::Events(_) => Capability::FetchEvents,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Upcoming(v) => v.len(),
            Payload::Results(v) => v.len(),
            Payload::Rankings(v) => v.len(),
            Payload::PlayerStats(v) => v.len(),
            Payload::Events(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode raw JSON records for a capability
    ///
    /// Records that fail to decode are skipped and counted.
    pub fn decode(capability: Capability, values: Vec<Value>) -> Decoded {
        match capability {
            Capability::FetchUpcoming => decode_all(values, Payload::Upcoming),
            Capability::FetchResults => decode_all(values, Payload::Results),
            Capability::FetchRankings => decode_all(values, Payload::Rankings),
            Capability::FetchPlayerStats => decode_all(values, Payload::PlayerStats),
            Capability::FetchEvents => decode_all(values, Payload::Events),
        }
    }

    pub fn into_upcoming(self) -> Option<Vec<UpcomingMatch>> {
        match self {
            Payload::Upcoming(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_results(self) -> Option<Vec<MatchResult>> {
        match self {
            Payload::Results(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_rankings(self) -> Option<Vec<TeamRanking>> {
        match self {
            Payload::Rankings(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_player_stats(self) -> Option<Vec<PlayerStats>> {
        match self {
            Payload::PlayerStats(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<Vec<Event>> {
        match self {
            Payload::Events(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of decoding a batch of raw records
#[derive(Debug, Clone)]
pub struct Decoded {
    pub payload: Payload,
    /// Raw records that did not match the record shape
    pub skipped: usize,
    pub first_error: Option<String>,
}

impl Decoded {
    /// True when there was input but none of it decoded
    pub fn all_rejected(&self) -> bool {
        self.payload.is_empty() && self.skipped > 0
    }
}

fn decode_all<T, F>(values: Vec<Value>, wrap: F) -> Decoded
where
    T: DeserializeOwned,
    F: FnOnce(Vec<T>) -> Payload,
{
    let mut records = Vec::with_capacity(values.len());
    let mut skipped = 0;
    let mut first_error = None;

    for value in values {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
            }
        }
    }

    Decoded {
        payload: wrap(records),
        skipped,
        first_error,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
