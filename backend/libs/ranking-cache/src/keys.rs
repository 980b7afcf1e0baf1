//! Unified cache key schema
//!
//! Every producer and consumer of ranking data must build keys here.
//! Key format: v{VERSION}:{entity}:{identifier}[:sub_key]

use uuid::Uuid;

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    // ============= Vector Keys =============

    /// Feature vector of a catalog entity
    /// Format: v1:vector:{entity_id}
    pub fn entity_vector(entity_id: &str) -> String {
        format!("v{}:vector:{}", CACHE_VERSION, entity_id)
    }

    /// Pattern matching every cached entity vector
    pub fn vector_pattern() -> String {
        format!("v{}:vector:*", CACHE_VERSION)
    }

    // ============= Popularity Keys =============

    /// Popularity snapshot for a scope ("global", "segment:family", "category:hotel")
    /// Format: v1:popularity:{scope}
    pub fn popularity(scope: &str) -> String {
        format!("v{}:popularity:{}", CACHE_VERSION, scope)
    }

    /// Pattern matching every popularity scope; used for wholesale invalidation
    pub fn popularity_pattern() -> String {
        format!("v{}:popularity:*", CACHE_VERSION)
    }

    // ============= Recommendation Keys =============

    /// Assembled recommendation response for a user and search context
    /// Format: v1:recs:{user_id}:{context_hash}
    pub fn recommendations(user_id: Uuid, context_hash: &str) -> String {
        format!("v{}:recs:{}:{}", CACHE_VERSION, user_id, context_hash)
    }

    /// Pattern for all cached responses of a user
    pub fn recommendations_pattern(user_id: Uuid) -> String {
        format!("v{}:recs:{}:*", CACHE_VERSION, user_id)
    }

    // ============= Utility =============

    /// Extract entity type from key
    pub fn entity_type(key: &str) -> Option<&str> {
        // Format: v{N}:{entity}:...
        let mut parts = key.split(':');
        parts.next()?;
        parts.next()
    }
}
