//! Read-through resource cache with stale-on-error fallback
//!
//! One entry per key, overwritten on refresh. Expiry is checked lazily on
//! access; nothing sweeps the map in the background and the key set is not
//! bounded. Concurrent callers that miss the same key each run their own
//! fetch (no single-flight coalescing).

use crate::error::{FailureKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Cached value
    pub value: T,
    /// When the entry was created
    pub created_at: Instant,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Get the remaining TTL
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Previously cached data served because a refresh failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleEnvelope<T> {
    pub data: T,
    pub is_stale: bool,
    pub error_type: FailureKind,
}

/// Outcome of [`ResourceCache::get_or_fetch`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// A cache hit or a successful fetch
    Fresh(T),
    /// The fetch failed and an older value was available
    Stale(StaleEnvelope<T>),
}

impl<T> CacheLookup<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, CacheLookup::Stale(_))
    }

    /// The data regardless of freshness
    pub fn into_data(self) -> T {
        match self {
            CacheLookup::Fresh(data) => data,
            CacheLookup::Stale(envelope) => envelope.data,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses (including expired entries)
    pub misses: u64,
    /// Refresh failures answered with stale data
    pub stale_served: u64,
    /// Refresh failures with nothing to fall back on
    pub failed_fetches: u64,
    /// Current number of entries
    pub entry_count: usize,
}

impl CacheStats {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keyed TTL cache for hub-derived documents
#[derive(Debug)]
pub struct ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    stats: RwLock<CacheStats>,
}

impl<V> ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Return the cached value for `key` if it is still within its TTL,
    /// otherwise run `fetch`.
    ///
    /// A successful fetch replaces the entry. A failed fetch falls back to
    /// the previous entry, even an expired one, wrapped in a
    /// [`StaleEnvelope`]; with no previous entry the fetch error is returned.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<CacheLookup<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(entry) = self.entries.read().await.get(key) {
            if !entry.is_expired() {
                trace!(key, remaining = ?entry.remaining_ttl(), "Cache hit");
                self.stats.write().await.hits += 1;
                return Ok(CacheLookup::Fresh(entry.value.clone()));
            }
            debug!(key, "Cache entry expired");
        }
        self.stats.write().await.misses += 1;

        match fetch().await {
            Ok(value) => {
                let mut entries = self.entries.write().await;
                entries.insert(key.to_string(), CacheEntry::new(value.clone(), ttl));
                self.stats.write().await.entry_count = entries.len();
                Ok(CacheLookup::Fresh(value))
            }
            Err(error) => {
                let previous = self.entries.read().await.get(key).map(|e| e.value.clone());
                match previous {
                    Some(data) => {
                        let error_type = error.failure_kind();
                        warn!(key, %error_type, "Fetch failed, serving stale data: {}", error);
                        self.stats.write().await.stale_served += 1;
                        Ok(CacheLookup::Stale(StaleEnvelope {
                            data,
                            is_stale: true,
                            error_type,
                        }))
                    }
                    None => {
                        self.stats.write().await.failed_fetches += 1;
                        Err(error)
                    }
                }
            }
        }
    }

    /// Drop the entry for `key`
    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.stats.write().await.entry_count = entries.len();
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.stats.write().await.entry_count = 0;
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }
}

impl<V> Default for ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HomeyError;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_fetches_once_within_ttl() {
        let cache = ResourceCache::new();
        let calls = AtomicU32::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        };

        assert_eq!(cache.get_or_fetch("k", TTL, fetch).await.unwrap(), CacheLookup::Fresh(42));
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get_or_fetch("k", TTL, fetch).await.unwrap(), CacheLookup::Fresh(42));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetches_after_expiry() {
        let cache = ResourceCache::new();
        cache.get_or_fetch("k", TTL, || async { Ok(1) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let lookup = cache.get_or_fetch("k", TTL, || async { Ok(2) }).await.unwrap();
        assert_eq!(lookup, CacheLookup::Fresh(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_on_connectivity_error() {
        let cache = ResourceCache::new();
        cache.get_or_fetch("k", TTL, || async { Ok("old") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;

        let lookup = cache
            .get_or_fetch("k", TTL, || async { Err(HomeyError::connection("refused")) })
            .await
            .unwrap();

        assert_eq!(
            lookup,
            CacheLookup::Stale(StaleEnvelope {
                data: "old",
                is_stale: true,
                error_type: FailureKind::Connection,
            })
        );
        assert_eq!(cache.stats().await.stale_served, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fallback_classifies_other_errors_as_unknown() {
        let cache = ResourceCache::new();
        cache.get_or_fetch("k", TTL, || async { Ok(1) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        let lookup = cache
            .get_or_fetch("k", TTL, || async { Err(HomeyError::external_service("500")) })
            .await
            .unwrap();
        match lookup {
            CacheLookup::Stale(envelope) => assert_eq!(envelope.error_type, FailureKind::Unknown),
            other => panic!("expected stale data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_propagates_without_prior_entry() {
        let cache: ResourceCache<u32> = ResourceCache::new();
        let result = cache
            .get_or_fetch("k", TTL, || async { Err(HomeyError::timeout("slow")) })
            .await;

        assert!(matches!(result, Err(HomeyError::Timeout(_))));
        assert_eq!(cache.stats().await.failed_fetches, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = ResourceCache::new();
        cache.get_or_fetch("a", TTL, || async { Ok(1) }).await.unwrap();
        let b = cache.get_or_fetch("b", TTL, || async { Ok(2) }).await.unwrap();
        assert_eq!(b.into_data(), 2);

        cache.invalidate("a").await;
        let a = cache.get_or_fetch("a", TTL, || async { Ok(3) }).await.unwrap();
        assert_eq!(a.into_data(), 3);
        assert_eq!(cache.stats().await.entry_count, 2);
    }
}
