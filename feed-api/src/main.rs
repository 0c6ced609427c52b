//! Esports Feed API Server
//!
//! Composition root for the data-acquisition layer: loads the source
//! configuration, wires sources, limiters, cache and health monitor
//! together and serves them over HTTP.

mod config;
mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use feed_core::AggregateHealth;
use feed_services::{
    spawn_sweeper, DataAcquisition, FallbackAggregator, HealthMonitor, RateLimiters, TtlCache,
};
use feed_sources::{build_client, build_sources, registered_kinds, SourcesFile};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub acquisition: Arc<DataAcquisition>,
    /// Latest periodic health pass; `None` until the first one completes
    pub latest_health: watch::Receiver<Option<AggregateHealth>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,feed_api=debug")),
        )
        .init();

    info!("Starting Esports Feed API");

    let config = AppConfig::from_env()?;

    // Sources
    info!("Loading sources from: {}", config.sources_config);
    let sources_file = SourcesFile::load(&config.sources_config)?;
    let client = build_client(&sources_file.http)?;
    let sources = build_sources(&sources_file.sources, &client)?;
    if sources.is_empty() {
        warn!(
            "No sources enabled (known kinds: {:?}); every feed request will fail",
            registered_kinds().collect::<Vec<_>>()
        );
    }

    let limiters = Arc::new(RateLimiters::from_configs(&sources_file.sources));
    let aggregator = FallbackAggregator::new(sources, limiters, config.aggregator_config());

    // Cache with a background sweeper
    let cache = Arc::new(TtlCache::new(config.cache_config())?);
    spawn_sweeper(Arc::clone(&cache), config.cache_sweep_interval);
    info!(
        "Cache initialized (max size: {:?}, sweep every {:?}, stale grace {:?})",
        config.cache_max_size,
        config.cache_sweep_interval,
        cache.config().stale_grace
    );

    // Upstream health monitoring
    let monitor = Arc::new(HealthMonitor::new(
        client,
        sources_file.health_endpoints,
        config.monitor_config(),
    ));
    info!(
        "Monitoring {} upstream endpoints every {:?}",
        monitor.endpoints().len(),
        config.health_interval
    );
    let (latest_health, _health_task) = Arc::clone(&monitor).spawn_periodic(config.health_interval);

    let acquisition = Arc::new(DataAcquisition::new(
        aggregator,
        cache,
        monitor,
        config.acquisition_config(),
    ));

    // Create app state
    let state = AppState {
        acquisition,
        latest_health,
    };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
