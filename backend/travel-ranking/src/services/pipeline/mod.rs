// ============================================
// Recommendation Pipeline
// ============================================
//
// catalog entities -> Vectorizer -> entity vectors
//                  -> ColdStartSelector (path)
//                  -> Scorer (mode per path) -> ranked pool
//                  -> DiversityLayer (MMR) -> final list
//
// Pure computation over in-memory inputs. A pipeline is bound to one
// config snapshot, so a run never observes a config update mid-flight.

use crate::config::ConfigSnapshot;
use crate::error::{BatchItemError, Result};
use crate::models::{Entity, PopularitySnapshot, ScoredEntity, UserProfile};
use crate::services::cold_start::{self, ColdStartSelector, RecommendationStrategy, StrategyInput};
use crate::services::vectorizer::{vectorize_batch, VectorizeBatchResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One recommendation run's inputs
#[derive(Debug, Clone, Copy)]
pub struct RecommendationRequest<'a> {
    pub profile: &'a UserProfile,
    pub candidates: &'a [Entity],
    pub popularity: &'a PopularitySnapshot,
    /// Falls back to the configured default when absent
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    pub items: Vec<ScoredEntity>,
    pub path: RecommendationStrategy,
    pub vectorization_errors: Vec<BatchItemError>,
    pub config_version: u64,
}

pub struct RecommendationPipeline {
    snapshot: ConfigSnapshot,
}

impl RecommendationPipeline {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn config_version(&self) -> u64 {
        self.snapshot.version
    }

    /// Vectorize candidates and rank them for the user
    pub fn recommend(&self, request: RecommendationRequest<'_>) -> Result<RecommendationOutcome> {
        let vectors = vectorize_batch(request.candidates, &self.snapshot.config.vectorization);
        self.recommend_with_vectors(request, vectors)
    }

    /// Rank with vectors computed (or cached) by the caller. Candidates
    /// missing from `vectors.vectors` are left out.
    pub fn recommend_with_vectors(
        &self,
        request: RecommendationRequest<'_>,
        vectors: VectorizeBatchResult,
    ) -> Result<RecommendationOutcome> {
        let config = &self.snapshot.config;
        request.profile.data_quality.validate()?;

        if !vectors.errors.is_empty() {
            warn!(
                user_id = %request.profile.user_id,
                skipped = vectors.errors.len(),
                "Candidates dropped during vectorization"
            );
        }

        let path = ColdStartSelector::new(&config.cold_start).select_strategy(request.profile);
        let limit = request.limit.unwrap_or(config.diversity.default_limit);

        let items = cold_start::execute(
            path,
            StrategyInput {
                profile: request.profile,
                candidates: request.candidates,
                vectors: &vectors.vectors,
                popularity: request.popularity,
                limit,
            },
            config,
        );

        info!(
            user_id = %request.profile.user_id,
            path = path.as_str(),
            candidate_count = request.candidates.len(),
            returned = items.len(),
            config_version = self.snapshot.version,
            "Recommendations ranked"
        );

        Ok(RecommendationOutcome {
            items,
            path,
            vectorization_errors: vectors.errors,
            config_version: self.snapshot.version,
        })
    }
}
