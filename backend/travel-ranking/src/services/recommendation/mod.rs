// ============================================
// Recommendation Service
// ============================================
//
// Thin orchestration around the pure pipeline:
// 1. Response cache keyed by (user, search context hash); an entry is
//    served only when the config content, the profile and the candidate
//    set all match the ones it was built from
// 2. Vector cache keyed by entity id, tagged with the config and entity
//    fingerprints
// 3. Popularity snapshot from the popularity cache (computed on miss)
// 4. Interaction feedback handed to a fire-and-forget publisher
//
// Cache failures never fail a request; they degrade to computation.

use crate::config::{Config, ConfigSnapshot, ConfigStore};
use crate::error::Result;
use crate::models::{Category, Entity, FeatureVector, PopularityScope, UserProfile};
use crate::services::feedback::{
    publish_detached, FeedbackPublisher, InteractionEvent, RedisStreamPublisher,
};
use crate::services::pipeline::{
    RecommendationOutcome, RecommendationPipeline, RecommendationRequest,
};
use crate::services::popularity::PopularityCache;
use crate::services::vectorizer::{vectorize_batch, VectorizeBatchResult};
use crate::utils::content_fingerprint;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use ranking_cache::{CacheKey, CacheOperations, RedisCache, SharedRedis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Search parameters that distinguish cached responses for the same user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub destination: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub category: Option<Category>,
    pub limit: Option<usize>,
}

impl SearchContext {
    /// Stable identifier of the context for cache keys
    pub fn cache_hash(&self) -> String {
        content_fingerprint(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedResponse {
    config_fingerprint: String,
    request_fingerprint: String,
    outcome: RecommendationOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedVector {
    config_fingerprint: String,
    entity_fingerprint: String,
    vector: FeatureVector,
}

/// Identifies everything besides config and context that shapes a response
fn request_fingerprint(profile: &UserProfile, candidates: &[Entity]) -> String {
    content_fingerprint(&(profile, candidates))
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub vector_secs: u64,
    pub response_secs: u64,
}

impl From<&Config> for CacheTtls {
    fn from(config: &Config) -> Self {
        Self {
            vector_secs: config.vector_ttl_secs,
            response_secs: config.response_ttl_secs,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            vector_secs: ranking_cache::ttl::VECTOR,
            response_secs: ranking_cache::ttl::RECOMMENDATIONS,
        }
    }
}

pub struct RecommendationService<C: CacheOperations> {
    cache: Arc<C>,
    config: Arc<ConfigStore>,
    popularity: PopularityCache<C>,
    feedback: Arc<dyn FeedbackPublisher>,
    ttls: CacheTtls,
}

impl RecommendationService<RedisCache> {
    /// Service sharing one Redis connection for caches and the feedback stream
    pub fn from_config(redis: SharedRedis, config: &Config, store: Arc<ConfigStore>) -> Self {
        let cache = Arc::new(RedisCache::new(Arc::clone(&redis)));
        let publisher = RedisStreamPublisher::from_config(redis, config);
        info!(
            stream = publisher.stream_key(),
            response_ttl_secs = config.response_ttl_secs,
            "Recommendation service configured"
        );
        Self::new(
            Arc::clone(&cache),
            store,
            PopularityCache::new(cache, config.popularity_ttl_secs),
            Arc::new(publisher),
            CacheTtls::from(config),
        )
    }
}

impl<C: CacheOperations> RecommendationService<C> {
    pub fn new(
        cache: Arc<C>,
        config: Arc<ConfigStore>,
        popularity: PopularityCache<C>,
        feedback: Arc<dyn FeedbackPublisher>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            cache,
            config,
            popularity,
            feedback,
            ttls,
        }
    }

    /// Ranked recommendations for `profile` over `candidates`
    pub async fn recommend(
        &self,
        profile: &UserProfile,
        candidates: &[Entity],
        context: &SearchContext,
    ) -> Result<RecommendationOutcome> {
        let snapshot = self.config.snapshot();
        let response_key = CacheKey::recommendations(profile.user_id, &context.cache_hash());
        let request_fingerprint = request_fingerprint(profile, candidates);

        match self.cache.get::<CachedResponse>(&response_key).await {
            Ok(Some(cached))
                if cached.config_fingerprint == snapshot.fingerprint
                    && cached.request_fingerprint == request_fingerprint =>
            {
                debug!(user_id = %profile.user_id, "Serving cached recommendations");
                return Ok(cached.outcome);
            }
            Ok(Some(_)) => {
                debug!(user_id = %profile.user_id, "Cached recommendations are stale");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user_id = %profile.user_id, error = %e, "Response cache read failed");
            }
        }

        let vectors = self.load_vectors(candidates, &snapshot).await;
        let popularity = self
            .popularity
            .get_or_compute(
                PopularityScope::Global,
                candidates,
                &snapshot.config.popularity,
                &snapshot.config.segment_boosts,
                Utc::now(),
            )
            .await;

        let config_fingerprint = snapshot.fingerprint.clone();
        let outcome = RecommendationPipeline::new(snapshot).recommend_with_vectors(
            RecommendationRequest {
                profile,
                candidates,
                popularity: &popularity,
                limit: context.limit,
            },
            vectors,
        )?;

        let cached = CachedResponse {
            config_fingerprint,
            request_fingerprint,
            outcome,
        };
        if let Err(e) = self
            .cache
            .set(&response_key, &cached, self.ttls.response_secs)
            .await
        {
            warn!(user_id = %profile.user_id, error = %e, "Response cache write failed");
        }

        Ok(cached.outcome)
    }

    /// Cached vectors for the candidates; misses and entries built from a
    /// different config or entity content are recomputed and written back
    async fn load_vectors(
        &self,
        candidates: &[Entity],
        snapshot: &ConfigSnapshot,
    ) -> VectorizeBatchResult {
        let entity_fingerprints: HashMap<&str, String> = candidates
            .iter()
            .map(|e| (e.id.as_str(), content_fingerprint(e)))
            .collect();
        let keys: Vec<String> = candidates
            .iter()
            .map(|e| CacheKey::entity_vector(&e.id))
            .collect();
        let lookups = join_all(keys.iter().map(|key| self.cache.get::<CachedVector>(key))).await;

        let mut result = VectorizeBatchResult::default();
        let mut misses: Vec<&Entity> = Vec::new();

        for (entity, lookup) in candidates.iter().zip(lookups) {
            match lookup {
                Ok(Some(cached))
                    if cached.config_fingerprint == snapshot.fingerprint
                        && entity_fingerprints.get(entity.id.as_str())
                            == Some(&cached.entity_fingerprint) =>
                {
                    result.vectors.insert(entity.id.clone(), cached.vector);
                }
                Ok(_) => misses.push(entity),
                Err(e) => {
                    warn!(entity_id = %entity.id, error = %e, "Vector cache read failed");
                    misses.push(entity);
                }
            }
        }

        if misses.is_empty() {
            return result;
        }

        let computed = vectorize_batch(misses, &snapshot.config.vectorization);

        let fresh: Vec<(String, CachedVector)> = computed
            .vectors
            .iter()
            .filter_map(|(id, vector)| {
                let entity_fingerprint = entity_fingerprints.get(id.as_str())?.clone();
                Some((
                    CacheKey::entity_vector(id),
                    CachedVector {
                        config_fingerprint: snapshot.fingerprint.clone(),
                        entity_fingerprint,
                        vector: *vector,
                    },
                ))
            })
            .collect();
        let items: Vec<(&str, &CachedVector, u64)> = fresh
            .iter()
            .map(|(key, cached)| (key.as_str(), cached, self.ttls.vector_secs))
            .collect();
        if let Err(e) = self.cache.pipeline_set(&items).await {
            warn!(error = %e, count = items.len(), "Vector cache write failed");
        }

        result.vectors.extend(computed.vectors);
        result.errors = computed.errors;
        result
    }

    /// Drop all cached responses of a user
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<usize> {
        Ok(self
            .cache
            .scan_del(&CacheKey::recommendations_pattern(user_id))
            .await?)
    }

    /// Record an interaction without waiting for delivery
    pub fn record_interaction(&self, event: InteractionEvent) -> JoinHandle<()> {
        publish_detached(Arc::clone(&self.feedback), event)
    }
}
