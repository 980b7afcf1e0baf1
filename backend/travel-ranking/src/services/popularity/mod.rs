// ============================================
// Popularity Engine
// ============================================
//
// User-independent popularity scalar per entity, built from:
// - normalized rating
// - log-damped review volume
// - star classification
// - renovation / opening recency (linear decay over a fixed window)
//
// Weights are renormalized over the sub-signals actually present, so an
// entity missing its rating is scored from what remains instead of being
// dragged toward zero. Entities with no signal at all are omitted.
//
// `now` is always passed in: identical inputs give identical scores.

pub mod cache;

pub use cache::PopularityCache;

use crate::config::{PopularityWeights, SegmentBoostTable};
use crate::error::{BatchItemError, RankingError, Result};
use crate::models::{
    Entity, PopularityScope, PopularityScore, PopularitySignals, PopularitySnapshot,
};
use crate::utils::{clamp01, linear_decay, log_damp};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Output of `compute_all`: scores plus entities that were skipped
#[derive(Debug, Clone, Default)]
pub struct PopularityBatchResult {
    pub scores: HashMap<String, PopularityScore>,
    pub errors: Vec<BatchItemError>,
}

pub struct PopularityEngine {
    weights: PopularityWeights,
}

impl PopularityEngine {
    pub fn new(weights: PopularityWeights) -> Self {
        Self { weights }
    }

    /// Normalized sub-signals; `None` where the entity carries no data
    pub fn signals(&self, entity: &Entity, now: DateTime<Utc>) -> PopularitySignals {
        let rating = entity.rating.as_ref();
        PopularitySignals {
            rating: rating.map(|r| r.normalized()),
            review_volume: rating
                .map(|r| log_damp(r.review_count, self.weights.review_reference_count)),
            stars: entity.star_rating.map(|s| clamp01(s as f32 / 5.0)),
            recency: self.recency_bonus(entity, now),
        }
    }

    fn recency_bonus(&self, entity: &Entity, now: DateTime<Utc>) -> Option<f32> {
        let freshness = &entity.freshness;
        if !freshness.has_signal() {
            return None;
        }

        let window = self.weights.recency_window_days as f32;
        let decay = |at: DateTime<Utc>| {
            let age_days = (now - at).num_seconds() as f32 / 86_400.0;
            linear_decay(age_days, window)
        };

        // A flag without a date earns the full bonus
        let renovated = freshness
            .renovated_at
            .map(decay)
            .or(freshness.recently_renovated.then_some(1.0));
        let opened = freshness
            .opened_at
            .map(decay)
            .or(freshness.new_opening.then_some(1.0));

        Some(renovated.unwrap_or(0.0).max(opened.unwrap_or(0.0)))
    }

    /// Popularity for one entity.
    ///
    /// Fails with `InvalidInput` for malformed entities and
    /// `InsufficientSignal` when no sub-signal is available.
    pub fn compute_score(&self, entity: &Entity, now: DateTime<Utc>) -> Result<PopularityScore> {
        entity.validate()?;

        let signals = self.signals(entity, now);
        let weighted = [
            (signals.rating, self.weights.rating),
            (signals.review_volume, self.weights.review_volume),
            (signals.stars, self.weights.stars),
            (signals.recency, self.weights.recency),
        ];

        let (sum, total_weight) = weighted
            .iter()
            .filter_map(|(signal, weight)| signal.map(|s| (s * weight, *weight)))
            .fold((0.0f32, 0.0f32), |(sum, total), (value, weight)| {
                (sum + value, total + weight)
            });

        if total_weight <= 0.0 {
            return Err(RankingError::InsufficientSignal(entity.id.clone()));
        }

        let score = clamp01(sum / total_weight);
        if signals.available() < weighted.len() {
            debug!(
                entity_id = %entity.id,
                available = signals.available(),
                score,
                "Popularity computed from partial signals"
            );
        }

        Ok(PopularityScore {
            entity_id: entity.id.clone(),
            category: entity.category,
            score,
            computed_at: now,
            valid_until: now + Duration::hours(self.weights.validity_hours as i64),
            signals,
        })
    }

    /// Batch form for the scheduled refresh; one bad entity never fails the batch
    pub fn compute_all<'a, I>(&self, entities: I, now: DateTime<Utc>) -> PopularityBatchResult
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut result = PopularityBatchResult::default();

        for entity in entities {
            match self.compute_score(entity, now) {
                Ok(score) => {
                    result.scores.insert(entity.id.clone(), score);
                }
                Err(e) => {
                    warn!(entity_id = %entity.id, error = %e, "Popularity omitted for entity");
                    result.errors.push(BatchItemError::new(entity.id.clone(), &e));
                }
            }
        }

        info!(
            scored = result.scores.len(),
            omitted = result.errors.len(),
            "Popularity batch computed"
        );

        result
    }
}

/// Derive a scope's snapshot from global scores.
///
/// - Global: every score unchanged
/// - Category: only entities of that category
/// - Segment: global score times the segment's category boost, re-clamped
pub fn scope_snapshot(
    scores: &HashMap<String, PopularityScore>,
    scope: PopularityScope,
    boosts: &SegmentBoostTable,
    computed_at: DateTime<Utc>,
) -> PopularitySnapshot {
    let scoped = scores
        .iter()
        .filter_map(|(id, score)| match scope {
            PopularityScope::Global => Some(score.clone()),
            PopularityScope::Category(category) => {
                (score.category == category).then(|| score.clone())
            }
            PopularityScope::Segment(segment) => {
                let boost = boosts.lookup(Some(segment), score.category);
                Some(PopularityScore {
                    score: clamp01(score.score * boost),
                    ..score.clone()
                })
            }
        }
        .map(|s| (id.clone(), s)))
        .collect();

    PopularitySnapshot::new(scope, computed_at, scoped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, EntityKind, RatingAggregate, UserSegment};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn rated(id: &str, average: f32, reviews: u32) -> Entity {
        let mut entity = Entity::new(id, EntityKind::Accommodation, Category::Hotel);
        entity.rating = Some(RatingAggregate {
            average,
            scale: 10.0,
            review_count: reviews,
        });
        entity.star_rating = Some(4);
        entity
    }

    fn engine() -> PopularityEngine {
        PopularityEngine::new(PopularityWeights::default())
    }

    #[test]
    fn test_score_is_bounded_and_idempotent() {
        let entity = rated("h1", 8.5, 200);
        let first = engine().compute_score(&entity, now()).unwrap();
        let second = engine().compute_score(&entity, now()).unwrap();

        assert!((0.0..=1.0).contains(&first.score));
        assert_eq!(first, second);
        assert!(first.is_valid_at(now()));
        assert!(!first.is_valid_at(now() + Duration::hours(25)));
    }

    #[test]
    fn test_more_reviews_rank_higher() {
        let few = engine().compute_score(&rated("a", 8.0, 5), now()).unwrap();
        let many = engine().compute_score(&rated("b", 8.0, 900), now()).unwrap();
        assert!(many.score > few.score);
    }

    #[test]
    fn test_missing_rating_degrades_to_stars() {
        let mut entity = Entity::new("s", EntityKind::Accommodation, Category::Hotel);
        entity.star_rating = Some(5);

        let score = engine().compute_score(&entity, now()).unwrap();
        assert_eq!(score.signals.available(), 1);
        assert!((score.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_signal_is_insufficient() {
        let entity = Entity::new("empty", EntityKind::Destination, Category::City);
        assert!(matches!(
            engine().compute_score(&entity, now()),
            Err(RankingError::InsufficientSignal(_))
        ));
    }

    #[test]
    fn test_recency_decays_linearly() {
        let mut entity = rated("r", 8.0, 100);
        entity.freshness.renovated_at = Some(now() - Duration::days(73));

        let signals = engine().signals(&entity, now());
        assert!((signals.recency.unwrap() - 0.8).abs() < 1e-3);

        entity.freshness.renovated_at = Some(now() - Duration::days(400));
        assert_eq!(engine().signals(&entity, now()).recency, Some(0.0));
    }

    #[test]
    fn test_flag_without_date_gets_full_bonus() {
        let mut entity = rated("n", 8.0, 100);
        entity.freshness.new_opening = true;
        assert_eq!(engine().signals(&entity, now()).recency, Some(1.0));
    }

    #[test]
    fn test_compute_all_partial_failure() {
        let good = rated("good", 9.0, 300);
        let empty = Entity::new("empty", EntityKind::Destination, Category::City);
        let mut invalid = rated("invalid", 9.0, 300);
        invalid.star_rating = Some(7);

        let result = engine().compute_all([&good, &empty, &invalid], now());

        assert_eq!(result.scores.len(), 1);
        assert!(result.scores.contains_key("good"));
        let failed: Vec<_> = result.errors.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(failed, vec!["empty", "invalid"]);
    }

    #[test]
    fn test_scope_snapshots() {
        let hotel = rated("hotel", 8.0, 100);
        let mut hostel = rated("hostel", 8.0, 100);
        hostel.category = Category::Hostel;

        let scores = engine().compute_all([&hotel, &hostel], now()).scores;
        let boosts = SegmentBoostTable::standard();

        let global = scope_snapshot(&scores, PopularityScope::Global, &boosts, now());
        assert_eq!(global.len(), 2);

        let hostels = scope_snapshot(
            &scores,
            PopularityScope::Category(Category::Hostel),
            &boosts,
            now(),
        );
        assert_eq!(hostels.len(), 1);
        assert!(hostels.get("hostel").is_some());

        let luxury = scope_snapshot(
            &scores,
            PopularityScope::Segment(UserSegment::LuxuryTraveler),
            &boosts,
            now(),
        );
        assert!(luxury.get("hostel").unwrap() < global.get("hostel").unwrap());
        assert!(luxury.get("hotel").unwrap() > global.get("hotel").unwrap());
    }
}
