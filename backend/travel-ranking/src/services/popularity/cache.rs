//! Popularity snapshots behind the key-value cache.
//!
//! Snapshots are only ever replaced wholesale: `refresh` drops every
//! popularity key before writing the new generation. Readers treat any
//! cache failure as a miss and fall back to on-demand computation.

use super::{scope_snapshot, PopularityBatchResult, PopularityEngine};
use crate::config::{PopularityWeights, SegmentBoostTable};
use crate::error::Result;
use crate::models::{Category, Entity, PopularityScope, PopularitySnapshot, UserSegment};
use chrono::{DateTime, Utc};
use ranking_cache::{CacheKey, CacheOperations};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PopularityCache<C: CacheOperations> {
    cache: Arc<C>,
    ttl_secs: u64,
}

impl<C: CacheOperations> Clone for PopularityCache<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            ttl_secs: self.ttl_secs,
        }
    }
}

impl<C: CacheOperations> PopularityCache<C> {
    pub fn new(cache: Arc<C>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Every scope written by a refresh
    pub fn all_scopes() -> Vec<PopularityScope> {
        std::iter::once(PopularityScope::Global)
            .chain(Category::ALL.into_iter().map(PopularityScope::Category))
            .chain(UserSegment::ALL.into_iter().map(PopularityScope::Segment))
            .collect()
    }

    /// Cached snapshot for a scope, `None` on miss
    pub async fn get(&self, scope: PopularityScope) -> Result<Option<PopularitySnapshot>> {
        let key = CacheKey::popularity(&scope.cache_tag());
        Ok(self.cache.get::<PopularitySnapshot>(&key).await?)
    }

    /// Cached snapshot, or one computed on demand from `entities`.
    ///
    /// On-demand results are not written back; only `refresh` writes, so a
    /// generation is never mixed with partial recomputations.
    pub async fn get_or_compute(
        &self,
        scope: PopularityScope,
        entities: &[Entity],
        weights: &PopularityWeights,
        boosts: &SegmentBoostTable,
        now: DateTime<Utc>,
    ) -> PopularitySnapshot {
        match self.get(scope).await {
            Ok(Some(snapshot)) => {
                debug!(scope = %scope.cache_tag(), entries = snapshot.len(), "Popularity cache hit");
                return snapshot;
            }
            Ok(None) => {
                debug!(scope = %scope.cache_tag(), "Popularity cache miss, computing on demand");
            }
            Err(e) => {
                warn!(scope = %scope.cache_tag(), error = %e, "Popularity cache read failed, computing on demand");
            }
        }

        let batch = PopularityEngine::new(weights.clone()).compute_all(entities, now);
        scope_snapshot(&batch.scores, scope, boosts, now)
    }

    /// Drop every popularity key
    pub async fn invalidate(&self) -> Result<usize> {
        let deleted = self.cache.scan_del(&CacheKey::popularity_pattern()).await?;
        info!(deleted, "Popularity cache invalidated");
        Ok(deleted)
    }

    /// Replace the cached generation with snapshots derived from `batch`.
    /// Returns the number of snapshots written.
    pub async fn refresh(
        &self,
        batch: &PopularityBatchResult,
        boosts: &SegmentBoostTable,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.invalidate().await?;

        let snapshots: Vec<(String, PopularitySnapshot)> = Self::all_scopes()
            .into_iter()
            .map(|scope| {
                (
                    CacheKey::popularity(&scope.cache_tag()),
                    scope_snapshot(&batch.scores, scope, boosts, now),
                )
            })
            .collect();

        let items: Vec<(&str, &PopularitySnapshot, u64)> = snapshots
            .iter()
            .map(|(key, snapshot)| (key.as_str(), snapshot, self.ttl_secs))
            .collect();

        self.cache.pipeline_set(&items).await?;

        info!(
            snapshots = items.len(),
            entities = batch.scores.len(),
            "Popularity cache refreshed"
        );
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, RatingAggregate};
    use ranking_cache::InMemoryCache;

    fn catalog() -> Vec<Entity> {
        ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut entity = Entity::new(*id, EntityKind::Accommodation, Category::Hotel);
                entity.rating = Some(RatingAggregate {
                    average: 6.0 + i as f32,
                    scale: 10.0,
                    review_count: 100,
                });
                entity
            })
            .collect()
    }

    #[tokio::test]
    async fn test_miss_falls_back_to_computation() {
        let cache = PopularityCache::new(Arc::new(InMemoryCache::new()), 60);
        let snapshot = cache
            .get_or_compute(
                PopularityScope::Global,
                &catalog(),
                &PopularityWeights::default(),
                &SegmentBoostTable::standard(),
                Utc::now(),
            )
            .await;

        assert_eq!(snapshot.len(), 3);
        assert!(cache.get(PopularityScope::Global).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_writes_every_scope() {
        let backend = Arc::new(InMemoryCache::new());
        let cache = PopularityCache::new(Arc::clone(&backend), 60);
        let now = Utc::now();
        let batch = PopularityEngine::new(PopularityWeights::default()).compute_all(&catalog(), now);

        let written = cache
            .refresh(&batch, &SegmentBoostTable::standard(), now)
            .await
            .unwrap();

        assert_eq!(written, 1 + Category::ALL.len() + UserSegment::ALL.len());
        assert_eq!(backend.len(), written);

        let hotels = cache
            .get(PopularityScope::Category(Category::Hotel))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hotels.len(), 3);
        let villas = cache
            .get(PopularityScope::Category(Category::Villa))
            .await
            .unwrap()
            .unwrap();
        assert!(villas.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_previous_generation() {
        let backend = Arc::new(InMemoryCache::new());
        let cache = PopularityCache::new(Arc::clone(&backend), 60);
        let engine = PopularityEngine::new(PopularityWeights::default());
        let boosts = SegmentBoostTable::standard();
        let now = Utc::now();

        let entities = catalog();
        cache
            .refresh(&engine.compute_all(&entities, now), &boosts, now)
            .await
            .unwrap();
        cache
            .refresh(&engine.compute_all(&entities[..1], now), &boosts, now)
            .await
            .unwrap();

        let global = cache.get(PopularityScope::Global).await.unwrap().unwrap();
        assert_eq!(global.len(), 1);
        assert!(global.get("b").is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_all_scopes() {
        let cache = PopularityCache::new(Arc::new(InMemoryCache::new()), 60);
        let now = Utc::now();
        let batch = PopularityEngine::new(PopularityWeights::default()).compute_all(&catalog(), now);
        let written = cache
            .refresh(&batch, &SegmentBoostTable::standard(), now)
            .await
            .unwrap();

        assert_eq!(cache.invalidate().await.unwrap(), written);
        assert!(cache.get(PopularityScope::Global).await.unwrap().is_none());
    }
}
