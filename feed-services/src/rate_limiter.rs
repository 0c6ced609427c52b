//! Per-source rate limiting for outbound calls
//!
//! Each upstream source gets its own sliding-window limiter with an optional
//! minimum spacing between requests. Limiters for different sources never
//! block each other.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use feed_core::FetchError;
use feed_sources::{RateLimitSettings, SourceConfig};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Request budget for one limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub min_interval: Option<Duration>,
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests.max(1),
            window: settings.window(),
            min_interval: settings.min_interval(),
        }
    }
}

/// Sliding-window rate limiter with request spacing
///
/// ## Reservation-Based Scheduling
///
/// Callers reserve their time slot while holding the lock, then release it
/// and sleep until the slot. Concurrent callers therefore always get distinct
/// slots and the window ceiling holds under parallel load.
///
/// Every reserved slot is kept until it falls out of the window, so the
/// `max_requests`-th previous slot bounds the next one. A caller dropped
/// while still waiting gives its future slot back.
#[derive(Debug)]
pub struct RateLimiter {
    /// Reserved slots, ascending; may contain slots in the future
    slots: Mutex<VecDeque<Instant>>,
    config: RateLimiterConfig,
    /// Name for logging purposes
    name: String,
    total_requests: AtomicU64,
    /// Requests that had to sleep before their slot
    waited_requests: AtomicU64,
    /// Requests refused because their slot was past the caller's deadline
    rejected_requests: AtomicU64,
}

impl RateLimiter {
    pub fn new(name: &str, config: RateLimiterConfig) -> Self {
        Self {
            slots: Mutex::new(VecDeque::with_capacity(config.max_requests.min(64) as usize)),
            config: RateLimiterConfig {
                max_requests: config.max_requests.max(1),
                ..config
            },
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            waited_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
        }
    }

    /// Limiter that only spaces requests out
    pub fn with_min_interval(name: &str, min_interval: Duration) -> Self {
        Self::new(
            name,
            RateLimiterConfig {
                max_requests: u32::MAX,
                window: min_interval,
                min_interval: Some(min_interval),
            },
        )
    }

    /// Wait for permission to make a request
    ///
    /// Fails with [`FetchError::RateLimited`] without reserving anything when
    /// the earliest free slot is after `deadline`.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<(), FetchError> {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        // Acquire lock and reserve our time slot
        let (slot, now) = {
            let mut slots = self.slots.lock();
            let now = Instant::now();

            while slots
                .front()
                .is_some_and(|&oldest| oldest + self.config.window <= now)
            {
                slots.pop_front();
            }

            let slot = self.next_slot(&slots, now);

            if let Some(deadline) = deadline {
                if slot > deadline {
                    self.rejected_requests.fetch_add(1, Ordering::Relaxed);
                    let retry_after = slot.saturating_duration_since(now);
                    warn!(
                        "[RATE_LIMITER:{}] #{} REJECTED - next slot in {:?} is past the deadline",
                        self.name, request_num, retry_after
                    );
                    return Err(FetchError::rate_limited(&self.name, Some(retry_after)));
                }
            }

            slots.push_back(slot);
            (slot, now)
            // Lock is released here
        };

        if slot <= now {
            debug!("[RATE_LIMITER:{}] #{} IMMEDIATE", self.name, request_num);
            return Ok(());
        }

        // Wait outside the lock
        let wait = slot - now;
        self.waited_requests.fetch_add(1, Ordering::Relaxed);
        info!(
            "[RATE_LIMITER:{}] #{} QUEUED - must wait {:?}",
            self.name, request_num, wait
        );
        let _reservation = Reservation {
            limiter: self,
            slot,
            request_num,
        };
        tokio::time::sleep_until(slot).await;
        debug!(
            "[RATE_LIMITER:{}] #{} READY after waiting {:?}",
            self.name, request_num, wait
        );

        Ok(())
    }

    /// Earliest slot allowed by both the window and the spacing rule
    fn next_slot(&self, slots: &VecDeque<Instant>, now: Instant) -> Instant {
        let mut slot = now;
        let max = self.config.max_requests as usize;

        if slots.len() >= max {
            slot = slot.max(slots[slots.len() - max] + self.config.window);
        }
        if let Some(&last) = slots.back() {
            slot = slot.max(last);
            if let Some(min_interval) = self.config.min_interval {
                slot = slot.max(last + min_interval);
            }
        }

        slot
    }

    /// Drop a reserved slot nobody is going to use
    fn release(&self, slot: Instant) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter().rposition(|&reserved| reserved == slot) {
            Some(index) => {
                slots.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check if a request can be made immediately without waiting
    pub async fn can_acquire_immediately(&self) -> bool {
        let slots = self.slots.lock();
        let now = Instant::now();
        let live: VecDeque<Instant> = slots
            .iter()
            .copied()
            .filter(|&slot| slot + self.config.window > now)
            .collect();
        self.next_slot(&live, now) <= now
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    /// Get statistics about this rate limiter
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            name: self.name.clone(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            waited_requests: self.waited_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            max_requests: self.config.max_requests,
            window_ms: self.config.window.as_millis() as u64,
            min_interval_ms: self.config.min_interval.map(|d| d.as_millis() as u64),
        }
    }
}

/// A future slot held by a caller that is still sleeping
///
/// Dropping it before the slot is reached (the caller's future was cancelled)
/// hands the slot back so later callers are not delayed by it.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    slot: Instant,
    request_num: u64,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if Instant::now() >= self.slot {
            return;
        }
        if self.limiter.release(self.slot) {
            debug!(
                "[RATE_LIMITER:{}] #{} CANCELLED - slot released",
                self.limiter.name, self.request_num
            );
        }
    }
}

/// Statistics about rate limiter usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub name: String,
    pub total_requests: u64,
    pub waited_requests: u64,
    pub rejected_requests: u64,
    pub max_requests: u32,
    pub window_ms: u64,
    pub min_interval_ms: Option<u64>,
}

/// One limiter per source, keyed by source name
#[derive(Debug, Default)]
pub struct RateLimiters {
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[SourceConfig]) -> Self {
        let mut limiters = Self::new();
        for config in configs {
            limiters.insert(&config.name, RateLimiterConfig::from(&config.rate_limit));
        }
        limiters
    }

    pub fn insert(&mut self, source_name: &str, config: RateLimiterConfig) {
        self.limiters.insert(
            source_name.to_string(),
            Arc::new(RateLimiter::new(source_name, config)),
        );
    }

    pub fn get(&self, source_name: &str) -> Option<&Arc<RateLimiter>> {
        self.limiters.get(source_name)
    }

    /// Acquire a slot for `source_name`; sources without a limiter pass through
    pub async fn acquire(&self, source_name: &str, deadline: Option<Instant>) -> Result<(), FetchError> {
        match self.limiters.get(source_name) {
            Some(limiter) => limiter.acquire(deadline).await,
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> Vec<RateLimiterStats> {
        let mut stats: Vec<_> = self.limiters.values().map(|l| l.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}
