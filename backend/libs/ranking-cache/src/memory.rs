//! In-process cache backend
//!
//! Same contract as the Redis backend (JSON payloads, TTL, glob
//! invalidation) for single-node deployments and tests. The store is
//! bounded: once `max_entries` is reached, a write first sweeps expired
//! entries and then evicts the entries closest to expiry.

use crate::{CacheError, CacheMetrics, CacheOperations, CacheResult};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry {
    data: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Entry limit used by `InMemoryCache::new`
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// DashMap-backed cache with lazy expiry and an entry limit
#[derive(Clone)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `max_entries` keys (minimum 1)
    pub fn with_limits(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        debug!(max_entries, "Initializing in-memory cache");
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            self.metrics.record_eviction("expired", purged);
        }
        purged
    }

    /// Make room for one new key: sweep expired entries, then evict a
    /// tenth of the store (at least one), soonest expiry first
    fn enforce_limits(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.purge_expired();

        let len = self.entries.len();
        if len < self.max_entries {
            return;
        }

        let evict_count = (len / 10).max(len + 1 - self.max_entries);
        let mut by_expiry: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|e| (e.value().expires_at, e.key().clone()))
            .collect();
        by_expiry.sort();

        let mut evicted = 0;
        for (_, key) in by_expiry.into_iter().take(evict_count) {
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }

        warn!(
            evicted,
            max_entries = self.max_entries,
            "In-memory cache limit reached, evicting entries"
        );
        self.metrics.record_eviction("capacity", evicted);
    }

    /// Number of live (non-expired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_data(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }
}

#[async_trait::async_trait]
impl CacheOperations for InMemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.live_data(key) {
            Some(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    self.metrics.record_hit(key);
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache deserialization failed");
                    self.metrics.record_error(key, "deserialize");
                    self.entries.remove(key);
                    Ok(None)
                }
            },
            None => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                Ok(None)
            }
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> CacheResult<()> {
        if ttl_secs == 0 {
            return Err(CacheError::InvalidData(format!(
                "TTL must be positive for key {}",
                key
            )));
        }
        let data = serde_json::to_string(value).map_err(CacheError::Serialization)?;
        if !self.entries.contains_key(key) {
            self.enforce_limits();
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                data,
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
            },
        );
        self.metrics.record_write(key);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        self.metrics.record_invalidation(key, 1);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live_data(key).is_some())
    }

    async fn scan_del(&self, pattern: &str) -> CacheResult<usize> {
        let now = Instant::now();
        let mut deleted = 0;
        self.entries.retain(|key, entry| {
            if !glob_match(pattern, key) {
                return true;
            }
            if !entry.is_expired(now) {
                deleted += 1;
            }
            false
        });

        debug!(pattern = %pattern, deleted = deleted, "Cache scan delete");
        self.metrics.record_invalidation(pattern, deleted);
        Ok(deleted)
    }

    async fn pipeline_set<T: Serialize + Send + Sync>(
        &self,
        items: &[(&str, &T, u64)],
    ) -> CacheResult<()> {
        for (key, value, ttl) in items {
            self.set(key, *value, *ttl).await?;
        }
        Ok(())
    }
}

/// Redis-style glob match supporting `*` and `?`
fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((star_pi, star_ki)) = star {
            pi = star_pi + 1;
            ki = star_ki + 1;
            star = Some((star_pi, star_ki + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheKey;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("v1:popularity:*", "v1:popularity:global"));
        assert!(glob_match("v1:popularity:*", "v1:popularity:segment:family"));
        assert!(!glob_match("v1:popularity:*", "v1:vector:hotel-1"));
        assert!(glob_match("v1:recs:?:*", "v1:recs:a:ctx"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("abc", "abcd"));
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = InMemoryCache::new();
        cache.set("v1:vector:a", &vec![0.5f32; 8], 60).await.unwrap();

        let value: Option<Vec<f32>> = cache.get("v1:vector:a").await.unwrap();
        assert_eq!(value, Some(vec![0.5f32; 8]));
        assert!(cache.exists("v1:vector:a").await.unwrap());
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let cache = InMemoryCache::new();
        let value: Option<String> = cache.get("v1:vector:missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let cache = InMemoryCache::new();
        let result = cache.set("v1:vector:a", &1u32, 0).await;
        assert!(matches!(result, Err(CacheError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_scan_del_removes_only_matching_prefix() {
        let cache = InMemoryCache::new();
        cache
            .set(&CacheKey::popularity("global"), &1u32, 60)
            .await
            .unwrap();
        cache
            .set(&CacheKey::popularity("category:hotel"), &2u32, 60)
            .await
            .unwrap();
        cache
            .set(&CacheKey::entity_vector("hotel-1"), &3u32, 60)
            .await
            .unwrap();

        let deleted = cache
            .scan_del(&CacheKey::popularity_pattern())
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache
            .exists(&CacheKey::entity_vector("hotel-1"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_scan_del_counts_only_live_keys() {
        let cache = InMemoryCache::new();
        cache
            .set(&CacheKey::popularity("global"), &1u32, 1)
            .await
            .unwrap();
        cache
            .set(&CacheKey::popularity("category:hotel"), &2u32, 60)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let deleted = cache
            .scan_del(&CacheKey::popularity_pattern())
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(cache.entries.len(), 0);
    }

    #[tokio::test]
    async fn test_expired_entries_swept_when_limit_reached() {
        let cache = InMemoryCache::with_limits(3);
        cache.set("v1:vector:a", &1u32, 1).await.unwrap();
        cache.set("v1:vector:b", &2u32, 1).await.unwrap();
        cache.set("v1:vector:c", &3u32, 60).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        cache.set("v1:vector:d", &4u32, 60).await.unwrap();

        assert_eq!(cache.entries.len(), 2);
        assert!(cache.exists("v1:vector:c").await.unwrap());
        assert!(cache.exists("v1:vector:d").await.unwrap());
    }

    #[tokio::test]
    async fn test_live_entries_evicted_over_limit() {
        let cache = InMemoryCache::with_limits(3);
        cache.set("v1:vector:a", &1u32, 10).await.unwrap();
        cache.set("v1:vector:b", &2u32, 60).await.unwrap();
        cache.set("v1:vector:c", &3u32, 60).await.unwrap();
        cache.set("v1:vector:d", &4u32, 60).await.unwrap();

        assert_eq!(cache.entries.len(), 3);
        // Closest to expiry goes first
        assert!(!cache.exists("v1:vector:a").await.unwrap());
        assert!(cache.exists("v1:vector:d").await.unwrap());

        for i in 0..20 {
            cache
                .set(&format!("v1:vector:extra-{}", i), &i, 60)
                .await
                .unwrap();
            assert!(cache.entries.len() <= cache.max_entries());
        }
    }

    #[tokio::test]
    async fn test_overwrite_at_limit_does_not_evict() {
        let cache = InMemoryCache::with_limits(2);
        cache.set("v1:vector:a", &1u32, 60).await.unwrap();
        cache.set("v1:vector:b", &2u32, 60).await.unwrap();
        cache.set("v1:vector:a", &3u32, 60).await.unwrap();

        assert_eq!(cache.len(), 2);
        let value: Option<u32> = cache.get("v1:vector:a").await.unwrap();
        assert_eq!(value, Some(3));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_treated_as_miss() {
        let cache = InMemoryCache::new();
        cache.set("v1:vector:a", &"not a vector", 60).await.unwrap();

        let value: Option<Vec<f32>> = cache.get("v1:vector:a").await.unwrap();
        assert!(value.is_none());
        assert!(!cache.exists("v1:vector:a").await.unwrap());
    }
}
