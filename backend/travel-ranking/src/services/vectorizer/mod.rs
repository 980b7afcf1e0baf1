// ============================================
// Vectorizer
// ============================================
//
// Maps catalog attributes into the shared 8-dimension space used by user
// preference vectors. Every dimension is an additive sum of non-negative
// sub-weights saturated at 1, so adding a qualifying amenity can never lower
// a dimension. Missing attributes contribute 0.

use crate::config::{BudgetConfig, GroupSizeWeights, UrbanWeights, VectorizationConfig};
use crate::error::{BatchItemError, Result};
use crate::models::{Amenity, Dimension, Entity, FeatureVector, DIMENSIONS};
use crate::utils::{clamp01, log_damp};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Result of a batch run: vectors for every valid entity plus the skipped ones
#[derive(Debug, Default)]
pub struct VectorizeBatchResult {
    pub vectors: HashMap<String, FeatureVector>,
    pub errors: Vec<BatchItemError>,
}

/// Vectorize a single entity. Malformed entities are rejected.
pub fn vectorize(entity: &Entity, config: &VectorizationConfig) -> Result<FeatureVector> {
    entity.validate()?;

    let mut values = [0.0f32; DIMENSIONS];
    values[Dimension::Climate.index()] = amenity_sum(entity, &config.climate);
    values[Dimension::Culture.index()] = amenity_sum(entity, &config.culture);
    values[Dimension::Budget.index()] = budget_level(entity, &config.budget);
    values[Dimension::Activity.index()] = amenity_sum(entity, &config.activity);
    values[Dimension::GroupSize.index()] = group_fit(entity, &config.group_size);
    values[Dimension::Urban.index()] = urban_affinity(entity, &config.urban);
    values[Dimension::Gastronomy.index()] = amenity_sum(entity, &config.gastronomy);
    values[Dimension::Popularity.index()] =
        popularity_level(entity, config.popularity.review_reference_count);

    let vector = FeatureVector::new(values);
    debug!(entity_id = %entity.id, vector = ?vector.as_array(), "Entity vectorized");
    Ok(vector)
}

/// Vectorize many entities; a malformed entity is skipped and recorded,
/// never aborting the batch.
pub fn vectorize_batch<'a, I>(entities: I, config: &VectorizationConfig) -> VectorizeBatchResult
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut result = VectorizeBatchResult::default();

    for entity in entities {
        match vectorize(entity, config) {
            Ok(vector) => {
                result.vectors.insert(entity.id.clone(), vector);
            }
            Err(e) => {
                warn!(entity_id = %entity.id, error = %e, "Skipping entity in vectorization batch");
                result.errors.push(BatchItemError::new(entity.id.clone(), &e));
            }
        }
    }

    info!(
        vectorized = result.vectors.len(),
        skipped = result.errors.len(),
        "Vectorization batch completed"
    );

    result
}

fn amenity_sum(entity: &Entity, weights: &BTreeMap<Amenity, f32>) -> f32 {
    let sum: f32 = weights
        .iter()
        .filter(|(amenity, _)| entity.has_amenity(**amenity))
        .map(|(_, weight)| *weight)
        .sum();
    sum.min(1.0)
}

/// ratio / (ratio + k): monotone in price, 0 for free, approaching 1 for luxury
fn budget_level(entity: &Entity, config: &BudgetConfig) -> f32 {
    let Some(price) = &entity.price else {
        return 0.0;
    };

    if !price.currency.eq_ignore_ascii_case(&config.currency) {
        debug!(
            entity_id = %entity.id,
            currency = %price.currency,
            expected = %config.currency,
            "Price currency differs from market reference, budget left neutral"
        );
        return 0.0;
    }

    let ratio = price.amount / config.market_average_price;
    clamp01(ratio / (ratio + config.half_saturation_ratio))
}

fn group_fit(entity: &Entity, weights: &GroupSizeWeights) -> f32 {
    let occupancy = entity
        .capacity
        .map(|c| (c.max_guests as f32 / weights.reference_guests as f32).min(1.0))
        .unwrap_or(0.0);

    (weights.occupancy * occupancy + amenity_sum(entity, &weights.amenities)).min(1.0)
}

fn urban_affinity(entity: &Entity, weights: &UrbanWeights) -> f32 {
    let setting = entity
        .location
        .setting
        .and_then(|s| weights.settings.get(&s).copied())
        .unwrap_or(0.0);

    (setting + amenity_sum(entity, &weights.amenities)).min(1.0)
}

fn popularity_level(entity: &Entity, review_reference_count: u32) -> f32 {
    entity
        .rating
        .as_ref()
        .map(|r| r.normalized() * log_damp(r.review_count, review_reference_count))
        .unwrap_or(0.0)
}
