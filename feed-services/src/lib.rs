//! Acquisition services for esports data
//!
//! This crate sits between the source adapters and their callers: per-source
//! rate limiting, priority fallback, result caching and upstream health
//! monitoring, composed behind the [`DataAcquisition`] facade.

pub mod acquisition;
pub mod aggregator;
pub mod health_monitor;
pub mod rate_limiter;
pub mod ttl_cache;

pub use acquisition::{AcquisitionConfig, CacheTtls, DataAcquisition, ResultCache};
pub use aggregator::{AggregatorConfig, EmptyResultPolicy, FallbackAggregator};
pub use health_monitor::{HealthMonitor, HealthMonitorConfig, HttpProbe, Probe};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterStats, RateLimiters};
pub use ttl_cache::{
    spawn_sweeper, CacheConfig, CacheKey, CacheStats, Lookup, Memoized, TtlCache,
};
