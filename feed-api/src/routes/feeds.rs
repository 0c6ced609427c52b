//! Feed endpoints
//!
//! Thin handlers over [`feed_services::DataAcquisition`]: parse the request,
//! fetch, and map acquisition errors onto gateway status codes.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use feed_core::{
    AcquisitionError, Capability, FetchParams, FetchResult, Game, SourceFailure, TeamRanking,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ErrorResponse;
use crate::AppState;

/// Query parameters for a feed request
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub region: Option<String>,
    /// Player stats window in days
    pub timespan: Option<u32>,
    /// Result pages to fetch
    pub pages: Option<u32>,
    /// Events filter; upcoming defaults to true, completed to false
    pub upcoming: Option<bool>,
    pub completed: Option<bool>,
}

impl FeedQuery {
    fn into_params(self, game: Game) -> FetchParams {
        let mut params = FetchParams::new(game).with_event_status(
            self.upcoming.unwrap_or(true),
            self.completed.unwrap_or(false),
        );
        if let Some(region) = self.region.filter(|r| !r.is_empty()) {
            params = params.with_region(region.to_lowercase());
        }
        if let Some(days) = self.timespan {
            params = params.with_timespan_days(days);
        }
        if let Some(pages) = self.pages {
            params = params.with_pages(pages);
        }
        params
    }
}

/// Body returned when no source could serve a request
#[derive(Debug, Serialize)]
pub struct AcquisitionErrorResponse {
    pub error: String,
    pub capability: Capability,
    pub timed_out: bool,
    pub failures: Vec<SourceFailure>,
}

impl From<&AcquisitionError> for AcquisitionErrorResponse {
    fn from(err: &AcquisitionError) -> Self {
        Self {
            error: err.to_string(),
            capability: err.capability(),
            timed_out: err.is_timeout(),
            failures: err.failures().to_vec(),
        }
    }
}

/// Per-region entry of the all-regions rankings response
#[derive(Debug, Serialize)]
pub struct RegionRankings {
    pub region_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FetchResult<Vec<TeamRanking>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AcquisitionErrorResponse>,
}

/// Response for rankings across every region
#[derive(Debug, Serialize)]
pub struct AllRankingsResponse {
    pub game: Game,
    pub succeeded: usize,
    pub regions: BTreeMap<String, RegionRankings>,
}

/// Create feed routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feeds/{game}/{capability}", get(get_feed))
        .route("/feeds/{game}/rankings/all", get(get_all_rankings))
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

fn acquisition_error(err: &AcquisitionError) -> Response {
    let status = if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(AcquisitionErrorResponse::from(err))).into_response()
}

/// Fetch one capability for a game
async fn get_feed(
    State(state): State<AppState>,
    Path((game, capability)): Path<(String, String)>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let game = match game.parse::<Game>() {
        Ok(game) => game,
        Err(e) => return bad_request(e),
    };
    let capability = match capability.parse::<Capability>() {
        Ok(capability) => capability,
        Err(e) => return bad_request(e),
    };
    let params = query.into_params(game);

    match state.acquisition.fetch_default(capability, &params).await {
        Ok(result) => {
            info!(
                "Returning {} {} records for {} from {}{}",
                result.payload.len(),
                capability,
                game.short_name(),
                result.source_name,
                if result.served_from_cache { " (cached)" } else { "" }
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            warn!("Feed request {}/{} failed: {}", game.short_name(), capability, e);
            acquisition_error(&e)
        }
    }
}

/// Rankings for every known region, fetched concurrently
async fn get_all_rankings(State(state): State<AppState>, Path(game): Path<String>) -> Response {
    let game = match game.parse::<Game>() {
        Ok(game) => game,
        Err(e) => return bad_request(e),
    };

    let outcomes = state.acquisition.rankings_all_regions(game).await;

    let mut succeeded = 0;
    let regions = outcomes
        .into_iter()
        .map(|(code, outcome)| {
            let region_name = feed_core::region_name(&code).unwrap_or("unknown");
            let entry = match outcome {
                Ok(result) => {
                    succeeded += 1;
                    RegionRankings {
                        region_name,
                        result: Some(result),
                        error: None,
                    }
                }
                Err(e) => RegionRankings {
                    region_name,
                    result: None,
                    error: Some(AcquisitionErrorResponse::from(&e)),
                },
            };
            (code, entry)
        })
        .collect();

    (
        StatusCode::OK,
        Json(AllRankingsResponse {
            game,
            succeeded,
            regions,
        }),
    )
        .into_response()
}
