//! In-memory cache with per-entry expiration
//!
//! A single coarse-grained mutex guards the entries and the hit/miss
//! counters. Expired entries are dropped lazily on read and proactively by
//! [`TtlCache::cleanup_expired`] (see [`spawn_sweeper`]). With a non-zero
//! [`CacheConfig::stale_grace`], both keep an expired entry around for that
//! long past its TTL so it can still be handed out as a stale fallback.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use feed_core::{Capability, CacheError, FetchParams, Game};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache sizing and default expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    /// `None` for unbounded
    pub max_size: Option<usize>,
    /// How long an expired entry stays readable through [`TtlCache::lookup`]
    pub stale_grace: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            max_size: Some(1000),
            stale_grace: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    /// Insertion order, breaks `created_at` ties on eviction
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    /// Still worth keeping, live or within the stale grace window
    fn is_retained(&self, now: Instant, grace: Duration) -> bool {
        now.saturating_duration_since(self.created_at) <= self.ttl.saturating_add(grace)
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    next_seq: u64,
}

/// Result of a cache lookup that keeps expired values visible
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Hit(V),
    /// The entry was present but past its TTL
    ///
    /// It is removed unless it is still inside the stale grace window.
    Expired(V),
    Miss,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// 0.0 - 1.0
    pub hit_rate: f64,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub total_entries: usize,
    pub evictions: u64,
    pub max_size: Option<usize>,
}

/// Thread-safe key/value cache with TTL expiry and oldest-first eviction
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    config: CacheConfig,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        if config.default_ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }
        if config.max_size == Some(0) {
            return Err(CacheError::ZeroCapacity);
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                next_seq: 0,
            }),
            config,
        })
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Get a live value; an expired entry counts as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        match self.lookup(key) {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired(_) | Lookup::Miss => None,
        }
    }

    /// Like [`TtlCache::get`], but hands back the stale value of an expired entry
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return Lookup::Miss;
            }
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                inner.hits += 1;
                return Lookup::Hit(value);
            }
            Some(entry) if entry.is_retained(now, self.config.stale_grace) => {
                let value = entry.value.clone();
                inner.misses += 1;
                debug!("[CACHE] {} expired, kept as stale", key);
                return Lookup::Expired(value);
            }
            Some(_) => inner.entries.remove(key),
        };

        inner.misses += 1;
        match expired {
            Some(entry) => {
                debug!("[CACHE] {} expired", key);
                Lookup::Expired(entry.value)
            }
            None => Lookup::Miss,
        }
    }

    /// Insert or replace a value
    ///
    /// Inserting a new key at capacity evicts the oldest entry first;
    /// replacing an existing key never evicts.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        let mut inner = self.inner.lock();

        if let Some(max_size) = self.config.max_size {
            if !inner.entries.contains_key(key) && inner.entries.len() >= max_size {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| (entry.created_at, entry.seq))
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    inner.entries.remove(&oldest);
                    inner.evictions += 1;
                    debug!("[CACHE] evicted {} to make room for {}", oldest, key);
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
                seq,
            },
        );

        Ok(())
    }

    /// Remove one entry; returns whether it existed
    pub fn delete(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        before - inner.entries.len()
    }

    /// Remove everything and reset the counters
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }

    /// Drop all expired entries past the stale grace window, returning how
    /// many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let grace = self.config.stale_grace;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_retained(now, grace));
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let now = Instant::now();

        let total_entries = inner.entries.len();
        let expired_entries = inner.entries.values().filter(|e| e.is_expired(now)).count();
        let lookups = inner.hits + inner.misses;

        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups > 0 {
                inner.hits as f64 / lookups as f64
            } else {
                0.0
            },
            active_entries: total_entries - expired_entries,
            expired_entries,
            total_entries,
            evictions: inner.evictions,
            max_size: self.config.max_size,
        }
    }
}

/// Periodically sweep expired entries until the task is aborted
pub fn spawn_sweeper<V>(cache: Arc<TtlCache<V>>, every: Duration) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = cache.cleanup_expired();
            if removed > 0 {
                debug!("[CACHE] sweeper removed {} expired entries", removed);
            }
        }
    })
}

// ============================================================================
// Memoization
// ============================================================================

/// Canonical, unambiguous encoding of a value for use in a cache key
///
/// Implemented only for types whose encoding does not depend on iteration
/// order or float formatting. `HashMap`, `HashSet`, `f32` and `f64` are left
/// out on purpose.
pub trait CacheKey {
    fn write_key(&self, out: &mut String);

    fn cache_key(&self) -> String {
        let mut out = String::new();
        self.write_key(&mut out);
        out
    }
}

impl<T: CacheKey + ?Sized> CacheKey for &T {
    fn write_key(&self, out: &mut String) {
        (**self).write_key(out)
    }
}

impl CacheKey for str {
    fn write_key(&self, out: &mut String) {
        out.push_str(&format!("{:?}", self));
    }
}

impl CacheKey for String {
    fn write_key(&self, out: &mut String) {
        self.as_str().write_key(out)
    }
}

macro_rules! display_cache_key {
    ($($t:ty),*) => {
        $(
            impl CacheKey for $t {
                fn write_key(&self, out: &mut String) {
                    out.push_str(&self.to_string());
                }
            }
        )*
    };
}

display_cache_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char);

impl CacheKey for () {
    fn write_key(&self, out: &mut String) {
        out.push_str("()");
    }
}

impl<T: CacheKey> CacheKey for Option<T> {
    fn write_key(&self, out: &mut String) {
        match self {
            Some(value) => {
                out.push_str("Some(");
                value.write_key(out);
                out.push(')');
            }
            None => out.push_str("None"),
        }
    }
}

impl<T: CacheKey> CacheKey for [T] {
    fn write_key(&self, out: &mut String) {
        out.push('[');
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            item.write_key(out);
        }
        out.push(']');
    }
}

impl<T: CacheKey> CacheKey for Vec<T> {
    fn write_key(&self, out: &mut String) {
        self.as_slice().write_key(out)
    }
}

impl<T: CacheKey> CacheKey for BTreeSet<T> {
    fn write_key(&self, out: &mut String) {
        out.push('{');
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            item.write_key(out);
        }
        out.push('}');
    }
}

impl<K: CacheKey, V: CacheKey> CacheKey for BTreeMap<K, V> {
    fn write_key(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            key.write_key(out);
            out.push('=');
            value.write_key(out);
        }
        out.push('}');
    }
}

macro_rules! tuple_cache_key {
    ($($name:ident),+) => {
        impl<$($name: CacheKey),+> CacheKey for ($($name,)+) {
            #[allow(non_snake_case)]
            fn write_key(&self, out: &mut String) {
                let ($($name,)+) = self;
                out.push('(');
                let mut first = true;
                $(
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    $name.write_key(out);
                )+
                let _ = first;
                out.push(')');
            }
        }
    };
}

tuple_cache_key!(A);
tuple_cache_key!(A, B);
tuple_cache_key!(A, B, C);
tuple_cache_key!(A, B, C, D);

impl CacheKey for Capability {
    fn write_key(&self, out: &mut String) {
        out.push_str(self.as_str());
    }
}

impl CacheKey for Game {
    fn write_key(&self, out: &mut String) {
        out.push_str(self.short_name());
    }
}

impl CacheKey for FetchParams {
    fn write_key(&self, out: &mut String) {
        out.push_str(&format!(
            "{}:region={:?}:timespan={:?}:pages={:?}:upcoming={}:completed={}",
            self.game.short_name(),
            self.region,
            self.timespan_days,
            self.num_pages,
            self.include_upcoming,
            self.include_completed
        ));
    }
}

/// Memoizes one named function over a shared [`TtlCache`]
///
/// The cache key is the function name plus the canonical key of its
/// arguments, so several memoized functions can share one cache.
pub struct Memoized<V> {
    name: &'static str,
    cache: Arc<TtlCache<V>>,
    ttl: Option<Duration>,
}

impl<V: Clone> Memoized<V> {
    pub fn new(
        name: &'static str,
        cache: Arc<TtlCache<V>>,
        ttl: Option<Duration>,
    ) -> Result<Self, CacheError> {
        if name.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::ZeroTtl);
        }
        Ok(Self { name, cache, ttl })
    }

    pub fn key<A: CacheKey + ?Sized>(&self, args: &A) -> String {
        format!("{}:{}", self.name, args.cache_key())
    }

    pub fn cache(&self) -> &Arc<TtlCache<V>> {
        &self.cache
    }

    /// Return the cached value for `args`, computing and storing it on a miss
    pub fn call<A, F>(&self, args: &A, compute: F) -> V
    where
        A: CacheKey + ?Sized,
        F: FnOnce() -> V,
    {
        let key = self.key(args);
        if let Some(value) = self.cache.get(&key) {
            return value;
        }

        let value = compute();
        self.store(&key, value.clone());
        value
    }

    pub async fn call_async<A, F, Fut>(&self, args: &A, compute: F) -> V
    where
        A: CacheKey + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let key = self.key(args);
        if let Some(value) = self.cache.get(&key) {
            return value;
        }

        let value = compute().await;
        self.store(&key, value.clone());
        value
    }

    /// Like [`Memoized::call_async`]; errors are returned and never cached
    pub async fn try_call_async<A, F, Fut, E>(&self, args: &A, compute: F) -> Result<V, E>
    where
        A: CacheKey + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = self.key(args);
        if let Some(value) = self.cache.get(&key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.store(&key, value.clone());
        Ok(value)
    }

    fn store(&self, key: &str, value: V) {
        if let Err(e) = self.cache.set(key, value, self.ttl) {
            warn!("[CACHE] failed to memoize {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(ttl_secs: u64, max_size: Option<usize>) -> TtlCache<String> {
        TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(ttl_secs),
            max_size,
            stale_grace: Duration::ZERO,
        })
        .unwrap()
    }

    fn cache_with_grace(ttl_secs: u64, grace_secs: u64) -> TtlCache<String> {
        TtlCache::new(CacheConfig {
            default_ttl: Duration::from_secs(ttl_secs),
            max_size: None,
            stale_grace: Duration::from_secs(grace_secs),
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_until_expiry() {
        let cache = cache(60, None);
        cache
            .set("upcoming:val", "matches".to_string(), Some(Duration::from_secs(5)))
            .unwrap();

        assert_eq!(cache.get("upcoming:val").as_deref(), Some("matches"));
        assert_eq!(cache.stats().active_entries, 1);

        // Exactly at the TTL the entry is still live
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("upcoming:val").as_deref(), Some("matches"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.stats().active_entries, 0);
        assert_eq!(cache.stats().expired_entries, 1);
        assert_eq!(cache.get("upcoming:val"), None);

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_returns_stale_value() {
        let cache = cache(1, None);
        cache.set("k", "old".to_string(), None).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.lookup("k"), Lookup::Expired("old".to_string()));
        assert_eq!(cache.lookup("k"), Lookup::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_survives_repeated_reads_within_grace() {
        let cache = cache_with_grace(1, 30);
        cache.set("k", "old".to_string(), None).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.lookup("k"), Lookup::Expired("old".to_string()));
        assert_eq!(cache.lookup("k"), Lookup::Expired("old".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.active_entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 3);

        // Past TTL plus grace the entry goes like any other expired one
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.lookup("k"), Lookup::Expired("old".to_string()));
        assert_eq!(cache.lookup("k"), Lookup::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_spares_entries_within_grace() {
        let cache = cache_with_grace(10, 20);
        cache.set("stale", "s".to_string(), Some(Duration::from_secs(1))).unwrap();
        cache.set("gone", "g".to_string(), Some(Duration::from_secs(1))).unwrap();
        cache.set("live", "l".to_string(), Some(Duration::from_secs(600))).unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.lookup("stale"), Lookup::Expired("s".to_string()));

        // A fresh write replaces the stale entry
        cache.set("stale", "fresh".to_string(), Some(Duration::from_secs(60))).unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.get("gone"), None);
        assert_eq!(cache.get("stale").as_deref(), Some("fresh"));
        assert_eq!(cache.get("live").as_deref(), Some("l"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_oldest() {
        let cache = cache(600, Some(3));
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string(), None).unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        cache.set("d", "d".to_string(), None).unwrap();

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_tie_uses_insertion_order() {
        let cache = cache(600, Some(2));
        cache.set("first", "1".to_string(), None).unwrap();
        cache.set("second", "2".to_string(), None).unwrap();
        cache.set("third", "3".to_string(), None).unwrap();

        assert_eq!(cache.get("first"), None);
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_key_never_evicts() {
        let cache = cache(600, Some(2));
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();
        cache.set("a", "3".to_string(), None).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("3"));
        assert_eq!(cache.get("b").as_deref(), Some("2"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired_is_idempotent() {
        let cache = cache(10, None);
        cache.set("short", "s".to_string(), Some(Duration::from_secs(1))).unwrap();
        cache.set("long", "l".to_string(), None).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_misuse_is_rejected() {
        assert_eq!(
            TtlCache::<String>::new(CacheConfig {
                default_ttl: Duration::ZERO,
                max_size: None,
                stale_grace: Duration::ZERO,
            })
            .unwrap_err(),
            CacheError::ZeroTtl
        );
        assert_eq!(
            TtlCache::<String>::new(CacheConfig {
                default_ttl: Duration::from_secs(1),
                max_size: Some(0),
                stale_grace: Duration::ZERO,
            })
            .unwrap_err(),
            CacheError::ZeroCapacity
        );

        let cache = cache(10, None);
        assert_eq!(cache.set("", "v".to_string(), None), Err(CacheError::EmptyKey));
        assert_eq!(
            cache.set("k", "v".to_string(), Some(Duration::ZERO)),
            Err(CacheError::ZeroTtl)
        );
    }

    #[test]
    fn test_delete_clear_and_prefix() {
        let cache = cache(10, None);
        cache.set("rankings:val:na", "na".to_string(), None).unwrap();
        cache.set("rankings:val:eu", "eu".to_string(), None).unwrap();
        cache.set("events:val", "e".to_string(), None).unwrap();

        assert!(cache.delete("events:val"));
        assert!(!cache.delete("events:val"));
        assert_eq!(cache.delete_prefix("rankings:"), 2);
        assert!(cache.is_empty());

        cache.set("k", "v".to_string(), None).unwrap();
        cache.get("k");
        cache.get("missing");
        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(cache(1, None));
        cache.set("k", "v".to_string(), None).unwrap();

        let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(cache.len(), 0);
        handle.abort();
    }

    #[test]
    fn test_cache_keys_are_canonical() {
        assert_eq!("a,b".cache_key(), r#""a,b""#);
        assert_ne!(
            vec!["a".to_string(), "b".to_string()].cache_key(),
            vec!["a,b".to_string()].cache_key()
        );
        assert_eq!((1u32, Some("na")).cache_key(), r#"(1,Some("na"))"#);

        let a: BTreeMap<&str, u32> = [("x", 1), ("y", 2)].into_iter().collect();
        let b: BTreeMap<&str, u32> = [("y", 2), ("x", 1)].into_iter().collect();
        assert_eq!(a.cache_key(), b.cache_key());

        let params = FetchParams::new(Game::Valorant).with_region("EU");
        assert_eq!(
            CacheKey::cache_key(&params),
            CacheKey::cache_key(&FetchParams::new(Game::Valorant).with_region("eu"))
        );
    }

    #[test]
    fn test_memoized_computes_once() {
        let cache = Arc::new(cache(60, None));
        let memo = Memoized::new("region_name", Arc::clone(&cache), None).unwrap();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo.call("na", || {
                calls.fetch_add(1, Ordering::SeqCst);
                "North America".to_string()
            });
            assert_eq!(value, "North America");
        }
        memo.call("eu", || {
            calls.fetch_add(1, Ordering::SeqCst);
            "Europe".to_string()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.key("na"), r#"region_name:"na""#);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_try_call_async_does_not_cache_errors() {
        let cache = Arc::new(cache(60, None));
        let memo = Memoized::new("lookup", cache, Some(Duration::from_secs(5))).unwrap();

        let first: Result<String, String> = memo
            .try_call_async(&7u32, || async { Err("upstream down".to_string()) })
            .await;
        assert!(first.is_err());

        let second: Result<String, String> = memo
            .try_call_async(&7u32, || async { Ok("value".to_string()) })
            .await;
        assert_eq!(second.unwrap(), "value");

        let third = memo
            .call_async(&7u32, || async { "recomputed".to_string() })
            .await;
        assert_eq!(third, "value");
    }
}
