//! Health check and cache endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
    Router,
};
use feed_core::{AggregateHealth, Capability, HealthBand};
use feed_services::{CacheStats, RateLimiterStats};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ErrorResponse;
use crate::AppState;

/// Query parameters for the health check
#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    /// Probe every upstream now instead of returning the latest periodic pass
    #[serde(default)]
    pub fresh: bool,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: HealthBand,
    upstream: AggregateHealth,
}

/// Cache statistics response
#[derive(Debug, Serialize)]
struct CacheStatsResponse {
    cache: CacheStats,
    rate_limiters: Vec<RateLimiterStats>,
}

/// Invalidation response
#[derive(Debug, Serialize)]
struct InvalidateResponse {
    removed: usize,
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/cache/stats", get(cache_stats))
        .route("/cache", delete(clear_cache))
        .route("/cache/{capability}", delete(invalidate_capability))
}

/// Aggregate upstream health
///
/// 200 when every monitored endpoint is healthy, 503 otherwise.
async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = if query.fresh {
        None
    } else {
        state.latest_health.borrow().clone()
    };

    let upstream = match snapshot {
        Some(health) => health,
        None => state.acquisition.health().await,
    };
    let status = state.acquisition.health_band(&upstream);

    let code = if upstream.overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(HealthResponse { status, upstream }))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        cache: state.acquisition.cache_stats(),
        rate_limiters: state.acquisition.limiter_stats(),
    })
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.acquisition.clear_cache();
    info!("Cache cleared via API");
    StatusCode::NO_CONTENT
}

async fn invalidate_capability(
    State(state): State<AppState>,
    Path(capability): Path<String>,
) -> impl IntoResponse {
    match capability.parse::<Capability>() {
        Ok(capability) => {
            let removed = state.acquisition.invalidate_capability(capability);
            (StatusCode::OK, Json(InvalidateResponse { removed })).into_response()
        }
        Err(error) => (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{app, get, request, state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_liveness() {
        let (status, _) = get(app(state()), "/api/health/live").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_monitored_endpoints_is_unavailable() {
        let (status, body) = get(app(state()), "/api/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "critical");
        assert_eq!(body["upstream"]["total"], 0);
        assert_eq!(body["upstream"]["overall_healthy"], false);
    }

    #[tokio::test]
    async fn test_cache_stats_and_invalidation() {
        let state = state();

        let (status, _) = get(app(state.clone()), "/api/feeds/valorant/rankings?region=eu").await;
        assert_eq!(status, StatusCode::OK);
        get(app(state.clone()), "/api/feeds/valorant/rankings?region=eu").await;

        let (status, body) = get(app(state.clone()), "/api/cache/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cache"]["hits"], 1);
        assert_eq!(body["cache"]["misses"], 1);
        assert_eq!(body["cache"]["active_entries"], 1);
        assert!(body["rate_limiters"].as_array().unwrap().is_empty());

        let (status, body) = request(app(state.clone()), "DELETE", "/api/cache/rankings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);

        let (status, _) = request(app(state.clone()), "DELETE", "/api/cache/odds").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = request(app(state.clone()), "DELETE", "/api/cache").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = get(app(state), "/api/cache/stats").await;
        assert_eq!(body["cache"]["hits"], 0);
    }
}
