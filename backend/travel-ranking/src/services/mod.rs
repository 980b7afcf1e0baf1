pub mod cold_start;
pub mod diversity;
pub mod feedback;
pub mod pipeline;
pub mod popularity;
pub mod recommendation;
pub mod scoring;
pub mod vectorizer;

pub use cold_start::{ColdStartSelector, RecommendationStrategy};
pub use diversity::DiversityLayer;
pub use feedback::{
    FeedbackPublisher, InteractionEvent, InteractionKind, LogPublisher, RedisStreamPublisher,
};
pub use pipeline::{RecommendationOutcome, RecommendationPipeline, RecommendationRequest};
pub use popularity::{PopularityCache, PopularityEngine};
pub use recommendation::{CacheTtls, RecommendationService, SearchContext};
pub use scoring::{ScoreMode, Scorer};
pub use vectorizer::{vectorize, vectorize_batch};
