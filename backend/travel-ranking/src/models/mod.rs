//! Value types flowing through the ranking pipeline.
//!
//! Catalog entities and user profiles are read-only inputs owned by external
//! services; vectors, scores and popularity snapshots are produced here and
//! never mutated after creation.

mod entity;
mod popularity;
mod profile;
mod scored;
mod vector;

pub use entity::{
    Amenity, Capacity, Category, Entity, EntityKind, Freshness, Location, Price, RatingAggregate,
    Setting,
};
pub use popularity::{PopularityScope, PopularityScore, PopularitySignals, PopularitySnapshot};
pub use profile::{DataQuality, UserProfile, UserSegment};
pub use scored::{ScoreBreakdown, ScoredEntity};
pub use vector::{Dimension, FeatureVector, DIMENSIONS};
