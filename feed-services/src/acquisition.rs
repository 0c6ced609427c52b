//! Data acquisition facade
//!
//! The entry point callers use: cache lookup, then the fallback chain on a
//! miss, then write-through. Health and cache statistics are exposed here as
//! well so the composition root only holds one handle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use feed_core::{
    AcquisitionResult, AggregateHealth, Capability, Event, FetchParams, FetchResult, Game,
    HealthBand, MatchResult, Payload, PlayerStats, TeamRanking, UpcomingMatch, REGIONS,
};
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregator::FallbackAggregator;
use crate::health_monitor::HealthMonitor;
use crate::rate_limiter::RateLimiterStats;
use crate::ttl_cache::{CacheStats, Lookup, TtlCache};

/// Cache entries hold the full result so provenance survives a hit
pub type ResultCache = TtlCache<FetchResult<Payload>>;

/// Time-to-live per capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub upcoming: Duration,
    pub results: Duration,
    pub rankings: Duration,
    pub player_stats: Duration,
    pub events: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            upcoming: Duration::from_secs(60),
            results: Duration::from_secs(300),
            rankings: Duration::from_secs(3600),
            player_stats: Duration::from_secs(3600),
            events: Duration::from_secs(1800),
        }
    }
}

impl CacheTtls {
    pub fn for_capability(&self, capability: Capability) -> Duration {
        match capability {
            Capability::FetchUpcoming => self.upcoming,
            Capability::FetchResults => self.results,
            Capability::FetchRankings => self.rankings,
            Capability::FetchPlayerStats => self.player_stats,
            Capability::FetchEvents => self.events,
        }
    }
}

/// Configuration for DataAcquisition
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionConfig {
    pub ttls: CacheTtls,
    /// Deadline applied by the typed helpers
    pub fetch_timeout: Duration,
    /// On timeout, answer with an expired cache entry if one is still held
    ///
    /// Pair with a non-zero [`CacheConfig::stale_grace`](crate::CacheConfig)
    /// so expired entries outlive their first read and the sweeper.
    pub serve_stale_on_timeout: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ttls: CacheTtls::default(),
            fetch_timeout: Duration::from_secs(15),
            serve_stale_on_timeout: false,
        }
    }
}

/// Cache-fronted, health-monitored access to every configured source
pub struct DataAcquisition {
    aggregator: FallbackAggregator,
    cache: Arc<ResultCache>,
    monitor: Arc<HealthMonitor>,
    config: AcquisitionConfig,
}

impl DataAcquisition {
    pub fn new(
        aggregator: FallbackAggregator,
        cache: Arc<ResultCache>,
        monitor: Arc<HealthMonitor>,
        config: AcquisitionConfig,
    ) -> Self {
        if config.serve_stale_on_timeout && cache.config().stale_grace.is_zero() {
            warn!("[CACHE] serve-stale is on but the cache keeps no stale grace window");
        }
        Self {
            aggregator,
            cache,
            monitor,
            config,
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &FallbackAggregator {
        &self.aggregator
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Fetch one capability, served from the cache when possible
    pub async fn fetch(
        &self,
        capability: Capability,
        params: &FetchParams,
        deadline: Instant,
    ) -> AcquisitionResult<FetchResult<Payload>> {
        let key = params.cache_key(capability);

        let stale = match self.cache.lookup(&key) {
            Lookup::Hit(result) => {
                debug!("[CACHE] hit {}", key);
                return Ok(result.from_cache());
            }
            Lookup::Expired(result) => Some(result),
            Lookup::Miss => None,
        };
        debug!("[CACHE] miss {}", key);

        match self.aggregator.fetch(capability, params, deadline).await {
            Ok(result) => {
                let ttl = self.config.ttls.for_capability(capability);
                if let Err(e) = self.cache.set(&key, result.clone(), Some(ttl)) {
                    warn!("[CACHE] could not store {}: {}", key, e);
                }
                Ok(result)
            }
            Err(err) if err.is_timeout() && self.config.serve_stale_on_timeout => match stale {
                Some(stale) => {
                    warn!(
                        "[CACHE] serving stale {} from {} after timeout",
                        key, stale.source_name
                    );
                    Ok(stale.from_cache())
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Fetch with the configured default timeout
    pub async fn fetch_default(
        &self,
        capability: Capability,
        params: &FetchParams,
    ) -> AcquisitionResult<FetchResult<Payload>> {
        let deadline = Instant::now() + self.config.fetch_timeout;
        self.fetch(capability, params, deadline).await
    }

    pub async fn upcoming_matches(
        &self,
        params: &FetchParams,
    ) -> AcquisitionResult<FetchResult<Vec<UpcomingMatch>>> {
        let result = self.fetch_default(Capability::FetchUpcoming, params).await?;
        Ok(result.map(|p| p.into_upcoming().unwrap_or_default()))
    }

    pub async fn results(
        &self,
        params: &FetchParams,
    ) -> AcquisitionResult<FetchResult<Vec<MatchResult>>> {
        let result = self.fetch_default(Capability::FetchResults, params).await?;
        Ok(result.map(|p| p.into_results().unwrap_or_default()))
    }

    pub async fn rankings(
        &self,
        params: &FetchParams,
    ) -> AcquisitionResult<FetchResult<Vec<TeamRanking>>> {
        let result = self.fetch_default(Capability::FetchRankings, params).await?;
        Ok(result.map(|p| p.into_rankings().unwrap_or_default()))
    }

    pub async fn player_stats(
        &self,
        params: &FetchParams,
    ) -> AcquisitionResult<FetchResult<Vec<PlayerStats>>> {
        let result = self
            .fetch_default(Capability::FetchPlayerStats, params)
            .await?;
        Ok(result.map(|p| p.into_player_stats().unwrap_or_default()))
    }

    pub async fn events(&self, params: &FetchParams) -> AcquisitionResult<FetchResult<Vec<Event>>> {
        let result = self.fetch_default(Capability::FetchEvents, params).await?;
        Ok(result.map(|p| p.into_events().unwrap_or_default()))
    }

    /// Run unrelated requests concurrently under one shared deadline
    ///
    /// Results come back in request order.
    pub async fn fetch_many(
        &self,
        requests: &[(Capability, FetchParams)],
        deadline: Instant,
    ) -> Vec<AcquisitionResult<FetchResult<Payload>>> {
        join_all(
            requests
                .iter()
                .map(|(capability, params)| self.fetch(*capability, params, deadline)),
        )
        .await
    }

    /// Team rankings for every known region, fetched concurrently
    pub async fn rankings_all_regions(
        &self,
        game: Game,
    ) -> BTreeMap<String, AcquisitionResult<FetchResult<Vec<TeamRanking>>>> {
        let requests: Vec<(Capability, FetchParams)> = REGIONS
            .iter()
            .map(|(code, _)| {
                (
                    Capability::FetchRankings,
                    FetchParams::new(game).with_region(*code),
                )
            })
            .collect();

        let deadline = Instant::now() + self.config.fetch_timeout;
        let results = self.fetch_many(&requests, deadline).await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        info!(
            "Fetched {} rankings for {}/{} regions",
            game.display_name(),
            ok,
            results.len()
        );

        REGIONS
            .iter()
            .zip(results)
            .map(|((code, _), result)| {
                (
                    code.to_string(),
                    result.map(|r| r.map(|p| p.into_rankings().unwrap_or_default())),
                )
            })
            .collect()
    }

    /// Probe every monitored upstream endpoint
    pub async fn health(&self) -> AggregateHealth {
        self.monitor.check_all().await
    }

    pub fn health_band(&self, health: &AggregateHealth) -> HealthBand {
        self.monitor.classify(health)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn limiter_stats(&self) -> Vec<RateLimiterStats> {
        self.aggregator.limiters().stats()
    }

    /// Drop the cached result for one request
    pub fn invalidate(&self, capability: Capability, params: &FetchParams) -> bool {
        self.cache.delete(&params.cache_key(capability))
    }

    /// Drop every cached result for a capability
    pub fn invalidate_capability(&self, capability: Capability) -> usize {
        let removed = self
            .cache
            .delete_prefix(&format!("{}:", capability.as_str()));
        info!("[CACHE] invalidated {} {} entries", removed, capability);
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
