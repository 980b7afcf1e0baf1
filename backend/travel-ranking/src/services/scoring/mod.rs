// ============================================
// Scorer
// ============================================
//
// final = clamp01(w_sim * similarity + w_pop * popularity + w_q * quality)
//         * segment_boost, re-clamped to [0, 1]
//
// Missing popularity or quality falls back to NEUTRAL_SIGNAL and lowers
// confidence instead of failing. The batch form returns candidates
// unsorted; `rank_by_score` applies the one canonical ordering.

use crate::config::{RankingConfig, ScoringWeights, SegmentBoostTable};
use crate::models::{
    Category, Dimension, Entity, FeatureVector, PopularitySnapshot, ScoreBreakdown, ScoredEntity,
    UserProfile, UserSegment,
};
use crate::utils::clamp01;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Value substituted for an unavailable popularity or quality signal
pub const NEUTRAL_SIGNAL: f32 = 0.5;

const MAX_REASONS: usize = 3;
const SIMILARITY_REASON_MIN: f32 = 0.5;
const QUALITY_REASON_MIN: f32 = 0.8;
const POPULARITY_REASON_MIN: f32 = 0.7;
const FRESHNESS_REASON_WEIGHT: f32 = 0.01;

/// How much personalised similarity takes part in the final score
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreMode {
    /// Full weighted formula with segment boost
    Personalized,
    /// Popularity and quality only, no segment boost
    PopularityOnly,
    /// Popularity and quality with the segment boost
    SegmentPopularity,
    /// Linear interpolation: 0.0 = segment popularity, 1.0 = personalised
    Blend(f32),
}

impl ScoreMode {
    fn similarity_share(self) -> f32 {
        match self {
            ScoreMode::Personalized => 1.0,
            ScoreMode::PopularityOnly | ScoreMode::SegmentPopularity => 0.0,
            ScoreMode::Blend(factor) => clamp01(factor),
        }
    }
}

pub struct Scorer<'a> {
    weights: &'a ScoringWeights,
    boosts: &'a SegmentBoostTable,
}

impl<'a> Scorer<'a> {
    pub fn new(weights: &'a ScoringWeights, boosts: &'a SegmentBoostTable) -> Self {
        Self { weights, boosts }
    }

    pub fn from_config(config: &'a RankingConfig) -> Self {
        Self::new(&config.scoring, &config.segment_boosts)
    }

    /// Personalised breakdown for one candidate
    pub fn breakdown(
        &self,
        user_vector: &FeatureVector,
        entity_vector: &FeatureVector,
        popularity: f32,
        quality: f32,
        segment: Option<UserSegment>,
        category: Category,
    ) -> ScoreBreakdown {
        let similarity = user_vector.cosine_similarity(entity_vector);
        let segment_boost = self.boosts.lookup(segment, category);

        let relevance = clamp01(
            self.weights.similarity * similarity
                + self.weights.popularity * popularity
                + self.weights.quality * quality,
        );

        ScoreBreakdown {
            similarity,
            popularity,
            segment_boost,
            quality,
            final_score: clamp01(relevance * segment_boost),
        }
    }

    /// Breakdown without a preference vector: similarity is forced to 0 and
    /// the remaining weights are renormalized so the score spans [0, 1].
    pub fn popularity_breakdown(
        &self,
        popularity: f32,
        quality: f32,
        segment_boost: f32,
    ) -> ScoreBreakdown {
        let total = self.weights.popularity + self.weights.quality;
        let base = if total > 0.0 {
            (self.weights.popularity * popularity + self.weights.quality * quality) / total
        } else {
            popularity
        };

        ScoreBreakdown {
            similarity: 0.0,
            popularity,
            segment_boost,
            quality,
            final_score: clamp01(clamp01(base) * segment_boost),
        }
    }

    /// Score one candidate in the given mode
    pub fn score(
        &self,
        mode: ScoreMode,
        profile: &UserProfile,
        entity: &Entity,
        vector: FeatureVector,
        popularity: Option<f32>,
    ) -> ScoredEntity {
        let quality = entity.quality_signal();
        let pop_value = popularity.unwrap_or(NEUTRAL_SIGNAL);
        let quality_value = quality.unwrap_or(NEUTRAL_SIGNAL);
        let segment_boost = self.boosts.lookup(profile.segment, entity.category);
        let user_vector = profile.usable_vector();

        let breakdown = match (mode, user_vector) {
            (ScoreMode::PopularityOnly, _) => {
                self.popularity_breakdown(pop_value, quality_value, SegmentBoostTable::NEUTRAL)
            }
            (ScoreMode::SegmentPopularity, _) | (_, None) => {
                self.popularity_breakdown(pop_value, quality_value, segment_boost)
            }
            (ScoreMode::Personalized, Some(user)) => self.breakdown(
                user,
                &vector,
                pop_value,
                quality_value,
                profile.segment,
                entity.category,
            ),
            (ScoreMode::Blend(factor), Some(user)) => {
                let factor = clamp01(factor);
                let personal = self.breakdown(
                    user,
                    &vector,
                    pop_value,
                    quality_value,
                    profile.segment,
                    entity.category,
                );
                let fallback = self.popularity_breakdown(pop_value, quality_value, segment_boost);
                ScoreBreakdown {
                    final_score: clamp01(
                        factor * personal.final_score + (1.0 - factor) * fallback.final_score,
                    ),
                    ..personal
                }
            }
        };

        let similarity_available = mode.similarity_share() > 0.0
            && user_vector.is_some()
            && !vector.is_neutral();
        let available = [similarity_available, popularity.is_some(), quality.is_some()]
            .iter()
            .filter(|a| **a)
            .count();
        let confidence = available as f32 / 3.0;

        if available < 3 {
            debug!(
                entity_id = %entity.id,
                similarity_available,
                popularity_available = popularity.is_some(),
                quality_available = quality.is_some(),
                "Scored with degraded signals"
            );
        }

        let reasons = self.reasons(
            mode,
            &breakdown,
            user_vector.filter(|_| similarity_available),
            &vector,
            entity,
        );

        ScoredEntity {
            entity: entity.clone(),
            vector,
            breakdown,
            confidence,
            reasons,
            rank: None,
            diversity_contribution: None,
        }
    }

    /// Score every candidate that has a vector; output is unsorted.
    pub fn score_batch(
        &self,
        mode: ScoreMode,
        profile: &UserProfile,
        entities: &[Entity],
        vectors: &HashMap<String, FeatureVector>,
        popularity: &PopularitySnapshot,
    ) -> Vec<ScoredEntity> {
        entities
            .iter()
            .filter_map(|entity| match vectors.get(&entity.id) {
                Some(vector) => Some(self.score(
                    mode,
                    profile,
                    entity,
                    *vector,
                    popularity.get(&entity.id),
                )),
                None => {
                    warn!(entity_id = %entity.id, "Candidate has no vector, not scored");
                    None
                }
            })
            .collect()
    }

    /// Reasons ordered by how much their signal contributed, at most three
    fn reasons(
        &self,
        mode: ScoreMode,
        breakdown: &ScoreBreakdown,
        user_vector: Option<&FeatureVector>,
        entity_vector: &FeatureVector,
        entity: &Entity,
    ) -> Vec<String> {
        let mut candidates: Vec<(f32, String)> = Vec::new();

        if let Some(user) = user_vector {
            if breakdown.similarity >= SIMILARITY_REASON_MIN {
                let dominant = Dimension::ALL.into_iter().max_by(|a, b| {
                    (user.get(*a) * entity_vector.get(*a))
                        .total_cmp(&(user.get(*b) * entity_vector.get(*b)))
                });
                if let Some(dimension) = dominant {
                    candidates.push((
                        self.weights.similarity * breakdown.similarity * mode.similarity_share(),
                        format!("Matches your preferred {}", dimension.label()),
                    ));
                }
            }
        }

        if breakdown.quality >= QUALITY_REASON_MIN {
            candidates.push((
                self.weights.quality * breakdown.quality,
                "Highly rated by other travelers".to_string(),
            ));
        }

        if breakdown.popularity >= POPULARITY_REASON_MIN {
            candidates.push((
                self.weights.popularity * breakdown.popularity,
                "Popular with travelers".to_string(),
            ));
        }

        if mode != ScoreMode::PopularityOnly && breakdown.segment_boost > SegmentBoostTable::NEUTRAL
        {
            candidates.push((
                (breakdown.segment_boost - SegmentBoostTable::NEUTRAL) * breakdown.popularity,
                "Popular with travelers like you".to_string(),
            ));
        }

        if entity.freshness.new_opening {
            candidates.push((FRESHNESS_REASON_WEIGHT, "Newly opened".to_string()));
        } else if entity.freshness.recently_renovated {
            candidates.push((FRESHNESS_REASON_WEIGHT, "Recently renovated".to_string()));
        }

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates
            .into_iter()
            .take(MAX_REASONS)
            .map(|(_, reason)| reason)
            .collect()
    }
}

/// Sort by descending final score, then descending popularity, then entity id
pub fn rank_by_score(mut scored: Vec<ScoredEntity>) -> Vec<ScoredEntity> {
    scored.sort_by(ScoredEntity::ranking_cmp);
    scored
}
