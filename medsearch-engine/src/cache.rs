//! In-memory result cache keyed by (source id, query key).
//!
//! Backed by [`moka`] for bounded, async-friendly storage. Expiry is checked
//! lazily on read against the stored timestamp, so an entry is never served
//! once `now - stored_at` exceeds the TTL. Only real hits are cached: empty
//! result sets and error placeholders are dropped on insert so a transient
//! failure cannot poison later searches.

use std::time::{Duration, Instant};

use moka::future::Cache;

use crate::types::SearchResult;

/// Default time-to-live for cached result sets.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3_600);

/// Exact, case-sensitive cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source_id: String,
    query: String,
}

impl CacheKey {
    /// Build a key from a source id and a query key string.
    pub fn new(source_id: &str, query: &str) -> Self {
        Self {
            source_id: source_id.to_owned(),
            query: query.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    results: Vec<SearchResult>,
    stored_at: Instant,
}

/// TTL-bounded store of per-source result sets.
#[derive(Debug, Clone)]
pub struct ResultCache {
    inner: Cache<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    /// Create a cache. A zero `ttl` disables caching.
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if !ttl.is_zero() {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
            ttl,
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up results at the current time.
    pub async fn get(&self, source_id: &str, query: &str) -> Option<Vec<SearchResult>> {
        self.get_at(source_id, query, Instant::now()).await
    }

    /// Look up results as of `now`. Expired entries are evicted and missed.
    pub async fn get_at(&self, source_id: &str, query: &str, now: Instant) -> Option<Vec<SearchResult>> {
        if self.ttl.is_zero() {
            return None;
        }
        let key = CacheKey::new(source_id, query);
        let entry = self.inner.get(&key).await?;
        if now.saturating_duration_since(entry.stored_at) > self.ttl {
            tracing::trace!(source = source_id, "cache entry expired");
            self.inner.invalidate(&key).await;
            return None;
        }
        Some(entry.results)
    }

    /// Store results at the current time.
    pub async fn put(&self, source_id: &str, query: &str, results: &[SearchResult]) {
        self.put_at(source_id, query, results, Instant::now()).await;
    }

    /// Store results as of `now`. Empty or placeholder sets are ignored.
    pub async fn put_at(&self, source_id: &str, query: &str, results: &[SearchResult], now: Instant) {
        if self.ttl.is_zero() || results.is_empty() || results.iter().any(|r| r.is_error) {
            return;
        }
        let entry = CacheEntry {
            results: results.to_vec(),
            stored_at: now,
        };
        self.inner.insert(CacheKey::new(source_id, query), entry).await;
    }
}
