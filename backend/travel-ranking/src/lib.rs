pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::{Config, ConfigStore, RankingConfig};
pub use error::{BatchItemError, RankingError, Result};
pub use services::{
    ColdStartSelector, DiversityLayer, PopularityEngine, RecommendationPipeline,
    RecommendationService, RecommendationStrategy, Scorer,
};
