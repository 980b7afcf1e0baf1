use super::{Entity, FeatureVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Explainability breakdown of a final score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub similarity: f32,
    pub popularity: f32,
    pub segment_boost: f32,
    pub quality: f32,
    #[serde(rename = "final")]
    pub final_score: f32,
}

/// Candidate after scoring. Rank and diversity contribution are filled in by
/// the diversity pass; everything else is fixed at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub vector: FeatureVector,
    pub breakdown: ScoreBreakdown,
    pub confidence: f32,
    pub reasons: Vec<String>,
    /// 1-indexed position in the final list
    pub rank: Option<usize>,
    pub diversity_contribution: Option<f32>,
}

impl ScoredEntity {
    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub fn final_score(&self) -> f32 {
        self.breakdown.final_score
    }

    /// Ordering used everywhere a scored list is sorted: descending final
    /// score, then descending popularity, then ascending entity id.
    pub fn ranking_cmp(&self, other: &ScoredEntity) -> Ordering {
        other
            .breakdown
            .final_score
            .total_cmp(&self.breakdown.final_score)
            .then_with(|| {
                other
                    .breakdown
                    .popularity
                    .total_cmp(&self.breakdown.popularity)
            })
            .then_with(|| self.entity.id.cmp(&other.entity.id))
    }

    pub(crate) fn with_position(mut self, rank: usize, diversity_contribution: f32) -> Self {
        self.rank = Some(rank);
        self.diversity_contribution = Some(diversity_contribution);
        self
    }
}
