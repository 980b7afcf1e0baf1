use crate::config::DiversityConfig;
use crate::models::ScoredEntity;
use std::collections::HashSet;
use tracing::debug;

/// Diversity Layer - greedy MMR (Maximal Marginal Relevance) re-ranking
///
/// mmr = lambda * final - (1 - lambda) * max_similarity_to_selected
///
/// Never re-scores: breakdowns pass through untouched, only `rank` and
/// `diversity_contribution` are filled in.
pub struct DiversityLayer {
    lambda: f32, // relevance/diversity balance (0~1)
}

impl DiversityLayer {
    pub fn new(lambda: f32) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &DiversityConfig) -> Self {
        Self::new(config.lambda)
    }

    pub fn lambda(&self) -> f32 {
        self.lambda
    }

    /// Re-rank candidates and keep at most `limit`.
    /// lambda = 1.0: relevance only (reproduces the score order)
    /// lambda = 0.0: diversity only
    /// lambda = 0.7: balanced (default)
    pub fn rerank(&self, candidates: Vec<ScoredEntity>, limit: usize) -> Vec<ScoredEntity> {
        if candidates.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut pool = candidates;
        pool.sort_by(ScoredEntity::ranking_cmp);

        // Keep the best-ranked copy of any repeated entity
        let mut seen: HashSet<String> = HashSet::new();
        pool.retain(|c| seen.insert(c.id().to_string()));

        let target = limit.min(pool.len());
        let mut remaining: Vec<(ScoredEntity, f32)> = pool.into_iter().map(|c| (c, 0.0)).collect();
        let mut selected: Vec<ScoredEntity> = Vec::with_capacity(target);

        // MMR greedy selection; max similarity to the selected set is kept
        // per candidate and updated as items are picked
        while selected.len() < target {
            let mut best_idx = 0;
            let mut best_mmr = f32::NEG_INFINITY;

            for (i, (candidate, max_sim)) in remaining.iter().enumerate() {
                let mmr = if selected.is_empty() {
                    candidate.final_score()
                } else {
                    self.lambda * candidate.final_score() - (1.0 - self.lambda) * max_sim
                };

                // Strict comparison: ties go to the better-ranked candidate
                if mmr > best_mmr {
                    best_mmr = mmr;
                    best_idx = i;
                }
            }

            let (picked, max_sim) = remaining.remove(best_idx);
            for (candidate, candidate_max) in remaining.iter_mut() {
                let sim = candidate.vector.cosine_similarity(&picked.vector);
                if sim > *candidate_max {
                    *candidate_max = sim;
                }
            }

            let rank = selected.len() + 1;
            selected.push(picked.with_position(rank, 1.0 - max_sim));
        }

        debug!(
            lambda = self.lambda,
            selected = selected.len(),
            pool = selected.len() + remaining.len(),
            "MMR re-rank completed"
        );

        selected
    }
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::from_config(&DiversityConfig::default())
    }
}
