use super::{Category, UserSegment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized sub-signals a popularity score was built from; `None` when the
/// input was unavailable
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PopularitySignals {
    pub rating: Option<f32>,
    pub review_volume: Option<f32>,
    pub stars: Option<f32>,
    pub recency: Option<f32>,
}

impl PopularitySignals {
    pub fn available(&self) -> usize {
        [self.rating, self.review_volume, self.stars, self.recency]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityScore {
    pub entity_id: String,
    pub category: Category,
    /// Scalar in [0, 1]
    pub score: f32,
    pub computed_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub signals: PopularitySignals,
}

impl PopularityScore {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.computed_at && now < self.valid_until
    }
}

/// Cache scope of a popularity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PopularityScope {
    Global,
    Segment(UserSegment),
    Category(Category),
}

impl PopularityScope {
    /// Identifier used in cache keys
    pub fn cache_tag(&self) -> String {
        match self {
            PopularityScope::Global => "global".to_string(),
            PopularityScope::Segment(segment) => format!("segment:{}", segment.as_str()),
            PopularityScope::Category(category) => format!("category:{}", category.as_str()),
        }
    }
}

/// Read-only popularity map handed to a scoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularitySnapshot {
    pub scope: PopularityScope,
    pub computed_at: DateTime<Utc>,
    pub scores: HashMap<String, PopularityScore>,
}

impl PopularitySnapshot {
    pub fn new(
        scope: PopularityScope,
        computed_at: DateTime<Utc>,
        scores: HashMap<String, PopularityScore>,
    ) -> Self {
        Self {
            scope,
            computed_at,
            scores,
        }
    }

    pub fn empty(scope: PopularityScope, computed_at: DateTime<Utc>) -> Self {
        Self::new(scope, computed_at, HashMap::new())
    }

    /// Popularity scalar for an entity, if one was computed
    pub fn get(&self, entity_id: &str) -> Option<f32> {
        self.scores.get(entity_id).map(|s| s.score)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
