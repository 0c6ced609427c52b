//! API route definitions

mod feeds;
mod health;

use axum::Router;
use serde::Serialize;

use crate::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(feeds::routes())
        .merge(health::routes())
}
