// ============================================
// Cold Start Selector
// ============================================
//
// Picks how much a user's preference data can be trusted and routes the
// request accordingly. Tiers are ordered from poorest to richest:
//
//   completeness < 30                    -> POPULARITY_ONLY
//   completeness <= 70                   -> SEGMENT_POPULARITY
//   > 70, onboarding incomplete or
//   confidence below the floor           -> ADAPTIVE_BLEND
//   otherwise                            -> PERSONALIZED
//
// Without a usable preference vector the richest reachable tier is
// SEGMENT_POPULARITY. Selection is a pure function of the profile; raising
// completeness alone can only move a user to a richer tier.
//
// Every path goes through the same MMR pass, so callers get one output
// contract whichever tier was chosen.

use crate::config::{ColdStartThresholds, DiversityConfig, RankingConfig};
use crate::models::{Entity, FeatureVector, PopularitySnapshot, ScoredEntity, UserProfile};
use crate::services::diversity::DiversityLayer;
use crate::services::scoring::{rank_by_score, ScoreMode, Scorer};
use crate::utils::clamp01;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Recommendation strategy, ordered by how much personal data it relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationStrategy {
    PopularityOnly,
    SegmentPopularity,
    AdaptiveBlend,
    Personalized,
}

impl RecommendationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStrategy::PopularityOnly => "POPULARITY_ONLY",
            RecommendationStrategy::SegmentPopularity => "SEGMENT_POPULARITY",
            RecommendationStrategy::AdaptiveBlend => "ADAPTIVE_BLEND",
            RecommendationStrategy::Personalized => "PERSONALIZED",
        }
    }

    pub fn is_cold_start(&self) -> bool {
        *self != RecommendationStrategy::Personalized
    }
}

pub struct ColdStartSelector<'a> {
    thresholds: &'a ColdStartThresholds,
}

impl<'a> ColdStartSelector<'a> {
    pub fn new(thresholds: &'a ColdStartThresholds) -> Self {
        Self { thresholds }
    }

    /// Choose a strategy from the profile's data quality. Stateless.
    pub fn select_strategy(&self, profile: &UserProfile) -> RecommendationStrategy {
        let quality = &profile.data_quality;
        let t = self.thresholds;

        let strategy = if quality.completeness < t.popularity_only_below {
            RecommendationStrategy::PopularityOnly
        } else if quality.completeness <= t.segment_popularity_max
            || profile.usable_vector().is_none()
        {
            RecommendationStrategy::SegmentPopularity
        } else if !profile.onboarding_completed || quality.confidence < t.blend_confidence_floor {
            RecommendationStrategy::AdaptiveBlend
        } else {
            RecommendationStrategy::Personalized
        };

        debug!(
            user_id = %profile.user_id,
            completeness = quality.completeness,
            confidence = quality.confidence,
            strategy = strategy.as_str(),
            "Recommendation strategy selected"
        );

        strategy
    }

    /// Weight of personalised scoring in ADAPTIVE_BLEND: 0 at the segment
    /// tier ceiling, 1 at full confidence
    pub fn blend_factor(&self, completeness: f32) -> f32 {
        let span = self.thresholds.full_confidence - self.thresholds.segment_popularity_max;
        if span <= 0.0 {
            return 1.0;
        }
        clamp01((completeness - self.thresholds.segment_popularity_max) / span)
    }

    pub fn score_mode(&self, strategy: RecommendationStrategy, profile: &UserProfile) -> ScoreMode {
        match strategy {
            RecommendationStrategy::PopularityOnly => ScoreMode::PopularityOnly,
            RecommendationStrategy::SegmentPopularity => ScoreMode::SegmentPopularity,
            RecommendationStrategy::AdaptiveBlend => {
                ScoreMode::Blend(self.blend_factor(profile.data_quality.completeness))
            }
            RecommendationStrategy::Personalized => ScoreMode::Personalized,
        }
    }
}

/// Inputs of one strategy execution
pub struct StrategyInput<'a> {
    pub profile: &'a UserProfile,
    pub candidates: &'a [Entity],
    pub vectors: &'a HashMap<String, FeatureVector>,
    pub popularity: &'a PopularitySnapshot,
    pub limit: usize,
}

/// Score candidates under `strategy`, rank them, and pass the top
/// `limit * pool_multiplier` through MMR
pub fn execute(
    strategy: RecommendationStrategy,
    input: StrategyInput<'_>,
    config: &RankingConfig,
) -> Vec<ScoredEntity> {
    let selector = ColdStartSelector::new(&config.cold_start);
    let mode = selector.score_mode(strategy, input.profile);
    let scorer = Scorer::from_config(config);

    let scored = scorer.score_batch(
        mode,
        input.profile,
        input.candidates,
        input.vectors,
        input.popularity,
    );

    let pool_size = candidate_pool_size(input.limit, &config.diversity);
    let mut ranked = rank_by_score(scored);
    ranked.truncate(pool_size);

    let results = DiversityLayer::from_config(&config.diversity).rerank(ranked, input.limit);

    info!(
        user_id = %input.profile.user_id,
        strategy = strategy.as_str(),
        candidate_count = input.candidates.len(),
        returned = results.len(),
        "Strategy executed"
    );

    results
}

fn candidate_pool_size(limit: usize, config: &DiversityConfig) -> usize {
    limit.saturating_mul(config.pool_multiplier.max(1))
}
