use thiserror::Error;

/// Errors raised by the ranking core.
///
/// Degraded computations (missing amenity data, absent popularity) are not
/// errors: they lower `confidence` on the scored entity instead.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Malformed entity or profile. Batch operations skip and record it,
    /// single-item operations reject it.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Negative weights, malformed lookup tables and similar; rejected
    /// before a run starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No popularity sub-signal exists for the entity.
    #[error("Insufficient signal for entity {0}")]
    InsufficientSignal(String),

    /// Caller passed a vector with the wrong number of dimensions.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cache error: {0}")]
    Cache(#[from] ranking_cache::CacheError),
}

pub type Result<T> = std::result::Result<T, RankingError>;

/// Per-item failure recorded by batch operations.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchItemError {
    pub entity_id: String,
    pub reason: String,
}

impl BatchItemError {
    pub fn new(entity_id: impl Into<String>, error: &RankingError) -> Self {
        Self {
            entity_id: entity_id.into(),
            reason: error.to_string(),
        }
    }
}
