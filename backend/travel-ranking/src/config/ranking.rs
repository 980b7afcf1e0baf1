// ============================================
// Ranking configuration
// ============================================
//
// Immutable per scoring run. Callers take a `ConfigSnapshot` from the
// `ConfigStore` when a run starts; `ConfigStore::update` only affects
// snapshots taken afterwards.

use crate::error::{RankingError, Result};
use crate::models::{Amenity, Category, Setting, UserSegment};
use crate::utils::content_fingerprint;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn check_weight(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RankingError::Configuration(format!(
            "{} must be a non-negative finite number, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_table<K: std::fmt::Debug>(name: &str, table: &BTreeMap<K, f32>) -> Result<()> {
    for (key, value) in table {
        check_weight(&format!("{}.{:?}", name, key), *value)?;
    }
    Ok(())
}

fn weights(entries: &[(Amenity, f32)]) -> BTreeMap<Amenity, f32> {
    entries.iter().copied().collect()
}

/// Budget dimension reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub market_average_price: f32,
    pub currency: String,
    /// Price ratio at which the budget dimension reaches 0.5
    pub half_saturation_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSizeWeights {
    /// Weight of max_guests / reference_guests
    pub occupancy: f32,
    pub reference_guests: u32,
    pub amenities: BTreeMap<Amenity, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrbanWeights {
    pub settings: BTreeMap<Setting, f32>,
    pub amenities: BTreeMap<Amenity, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityDimensionConfig {
    /// Review count at which review volume saturates
    pub review_reference_count: u32,
}

/// Per-dimension sub-weights for the vectorizer. Weights inside a dimension
/// need not sum to 1; the vectorizer saturates each dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizationConfig {
    pub climate: BTreeMap<Amenity, f32>,
    pub culture: BTreeMap<Amenity, f32>,
    pub budget: BudgetConfig,
    pub activity: BTreeMap<Amenity, f32>,
    pub group_size: GroupSizeWeights,
    pub urban: UrbanWeights,
    pub gastronomy: BTreeMap<Amenity, f32>,
    pub popularity: PopularityDimensionConfig,
}

impl Default for VectorizationConfig {
    fn default() -> Self {
        Self {
            climate: weights(&[
                (Amenity::Pool, 0.3),
                (Amenity::AirConditioning, 0.2),
                (Amenity::Heating, 0.15),
                (Amenity::Sauna, 0.15),
                (Amenity::HotTub, 0.2),
            ]),
            culture: weights(&[
                (Amenity::MuseumNearby, 0.3),
                (Amenity::HistoricBuilding, 0.3),
                (Amenity::GuidedTours, 0.2),
                (Amenity::CulturalEvents, 0.2),
            ]),
            budget: BudgetConfig {
                market_average_price: 150.0,
                currency: "EUR".to_string(),
                half_saturation_ratio: 0.5,
            },
            activity: weights(&[
                (Amenity::Gym, 0.3),
                (Amenity::Hiking, 0.25),
                (Amenity::WaterSports, 0.2),
                (Amenity::BikeRental, 0.15),
                (Amenity::Spa, 0.1),
            ]),
            group_size: GroupSizeWeights {
                occupancy: 0.5,
                reference_guests: 6,
                amenities: weights(&[
                    (Amenity::FamilyRooms, 0.25),
                    (Amenity::KidsClub, 0.15),
                    (Amenity::ConnectingRooms, 0.1),
                ]),
            },
            urban: UrbanWeights {
                settings: [
                    (Setting::Urban, 0.8),
                    (Setting::Suburban, 0.5),
                    (Setting::Coastal, 0.3),
                    (Setting::Rural, 0.15),
                    (Setting::Remote, 0.0),
                ]
                .into_iter()
                .collect(),
                amenities: weights(&[(Amenity::PublicTransport, 0.2)]),
            },
            gastronomy: weights(&[
                (Amenity::FineDining, 0.3),
                (Amenity::Restaurant, 0.25),
                (Amenity::BreakfastIncluded, 0.2),
                (Amenity::Bar, 0.15),
                (Amenity::RoomService, 0.1),
            ]),
            popularity: PopularityDimensionConfig {
                review_reference_count: 1000,
            },
        }
    }
}

impl VectorizationConfig {
    pub fn validate(&self) -> Result<()> {
        check_table("climate", &self.climate)?;
        check_table("culture", &self.culture)?;
        check_table("activity", &self.activity)?;
        check_table("gastronomy", &self.gastronomy)?;
        check_table("group_size.amenities", &self.group_size.amenities)?;
        check_weight("group_size.occupancy", self.group_size.occupancy)?;
        check_table("urban.settings", &self.urban.settings)?;
        check_table("urban.amenities", &self.urban.amenities)?;

        if self.group_size.reference_guests == 0 {
            return Err(RankingError::Configuration(
                "group_size.reference_guests must be positive".to_string(),
            ));
        }

        let budget = &self.budget;
        if !budget.market_average_price.is_finite() || budget.market_average_price <= 0.0 {
            return Err(RankingError::Configuration(format!(
                "budget.market_average_price must be positive, got {}",
                budget.market_average_price
            )));
        }
        if !budget.half_saturation_ratio.is_finite() || budget.half_saturation_ratio <= 0.0 {
            return Err(RankingError::Configuration(format!(
                "budget.half_saturation_ratio must be positive, got {}",
                budget.half_saturation_ratio
            )));
        }
        if budget.currency.len() != 3 || !budget.currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(RankingError::Configuration(format!(
                "budget.currency must be an ISO 4217 code, got '{}'",
                budget.currency
            )));
        }

        Ok(())
    }
}

/// Relative weights of the three relevance signals. They need not sum to 1
/// since the combined score is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub similarity: f32,
    pub popularity: f32,
    pub quality: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            popularity: 0.25,
            quality: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        check_weight("scoring.similarity", self.similarity)?;
        check_weight("scoring.popularity", self.popularity)?;
        check_weight("scoring.quality", self.quality)?;
        if self.similarity + self.popularity + self.quality == 0.0 {
            return Err(RankingError::Configuration(
                "at least one scoring weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sub-weights and windows of the popularity engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityWeights {
    pub rating: f32,
    pub review_volume: f32,
    pub stars: f32,
    pub recency: f32,
    /// Review count at which review volume saturates
    pub review_reference_count: u32,
    /// Days over which a renovation/opening bonus decays linearly to zero
    pub recency_window_days: u32,
    /// How long a computed score stays valid
    pub validity_hours: u32,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        Self {
            rating: 0.4,
            review_volume: 0.3,
            stars: 0.2,
            recency: 0.1,
            review_reference_count: 1000,
            recency_window_days: 365,
            validity_hours: 24,
        }
    }
}

impl PopularityWeights {
    pub fn validate(&self) -> Result<()> {
        check_weight("popularity.rating", self.rating)?;
        check_weight("popularity.review_volume", self.review_volume)?;
        check_weight("popularity.stars", self.stars)?;
        check_weight("popularity.recency", self.recency)?;
        if self.validity_hours == 0 {
            return Err(RankingError::Configuration(
                "popularity.validity_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Two-level (segment x category) multiplier table. Missing entries are
/// neutral (1.0).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentBoostTable {
    boosts: BTreeMap<UserSegment, BTreeMap<Category, f32>>,
}

impl SegmentBoostTable {
    pub const NEUTRAL: f32 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boost(mut self, segment: UserSegment, category: Category, boost: f32) -> Self {
        self.boosts
            .entry(segment)
            .or_default()
            .insert(category, boost);
        self
    }

    /// Multiplier for (segment, category); 1.0 when absent or no segment
    pub fn lookup(&self, segment: Option<UserSegment>, category: Category) -> f32 {
        segment
            .and_then(|s| self.boosts.get(&s))
            .and_then(|row| row.get(&category))
            .copied()
            .unwrap_or(Self::NEUTRAL)
    }

    pub fn validate(&self) -> Result<()> {
        for (segment, row) in &self.boosts {
            check_table(&format!("segment_boosts.{:?}", segment), row)?;
        }
        Ok(())
    }

    /// Production table; boosts stay within [0.3, 1.4]
    pub fn standard() -> Self {
        use Category::*;
        use UserSegment::*;

        let rows: [(UserSegment, &[(Category, f32)]); 8] = [
            (
                BudgetBackpacker,
                &[(Hostel, 1.4), (Camping, 1.3), (Apartment, 1.1), (Resort, 0.5), (Villa, 0.3)],
            ),
            (
                FamilyExplorer,
                &[(Resort, 1.4), (Apartment, 1.2), (Camping, 1.1), (Beach, 1.2), (Hostel, 0.5)],
            ),
            (
                LuxuryTraveler,
                &[(Villa, 1.4), (Resort, 1.3), (Hotel, 1.1), (Hostel, 0.3), (Camping, 0.3)],
            ),
            (
                AdventureSeeker,
                &[(Mountain, 1.4), (Camping, 1.3), (Countryside, 1.2), (Resort, 0.7)],
            ),
            (
                CulturalEnthusiast,
                &[(City, 1.4), (Hotel, 1.1), (Countryside, 1.1), (Beach, 0.8)],
            ),
            (
                RomanticCouple,
                &[(Villa, 1.3), (Beach, 1.3), (Resort, 1.2), (Hostel, 0.4)],
            ),
            (
                BusinessTraveler,
                &[(Hotel, 1.3), (City, 1.3), (Apartment, 1.1), (Camping, 0.3), (Hostel, 0.6)],
            ),
            (
                SeniorComfort,
                &[(Hotel, 1.2), (Resort, 1.2), (Countryside, 1.1), (Hostel, 0.4), (Camping, 0.5)],
            ),
        ];

        rows.iter().fold(Self::new(), |table, (segment, entries)| {
            entries.iter().fold(table, |table, (category, boost)| {
                table.with_boost(*segment, *category, *boost)
            })
        })
    }
}

/// Data-quality thresholds (percent) driving the cold-start selector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColdStartThresholds {
    /// Completeness below this uses popularity only
    pub popularity_only_below: f32,
    /// Completeness up to and including this uses segment popularity
    pub segment_popularity_max: f32,
    /// Completeness at which adaptive blending reaches pure similarity
    pub full_confidence: f32,
    /// Profiles above the segment tier but under this confidence keep blending
    pub blend_confidence_floor: f32,
}

impl Default for ColdStartThresholds {
    fn default() -> Self {
        Self {
            popularity_only_below: 30.0,
            segment_popularity_max: 70.0,
            full_confidence: 100.0,
            blend_confidence_floor: 50.0,
        }
    }
}

impl ColdStartThresholds {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.popularity_only_below
            && self.popularity_only_below <= self.segment_popularity_max
            && self.segment_popularity_max < self.full_confidence
            && self.full_confidence <= 100.0;
        if !ordered {
            return Err(RankingError::Configuration(format!(
                "cold start thresholds must satisfy 0 <= {} <= {} < {} <= 100",
                self.popularity_only_below, self.segment_popularity_max, self.full_confidence
            )));
        }
        if !(0.0..=100.0).contains(&self.blend_confidence_floor) {
            return Err(RankingError::Configuration(format!(
                "blend_confidence_floor must be within [0, 100], got {}",
                self.blend_confidence_floor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiversityConfig {
    /// Relevance/diversity trade-off: 1.0 = pure relevance, 0.0 = pure diversity
    pub lambda: f32,
    /// MMR runs over the top `limit * pool_multiplier` scored candidates
    pub pool_multiplier: usize,
    pub default_limit: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            lambda: 0.7,
            pool_multiplier: 3,
            default_limit: 20,
        }
    }
}

impl DiversityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(RankingError::Configuration(format!(
                "diversity.lambda must be within [0, 1], got {}",
                self.lambda
            )));
        }
        if self.pool_multiplier == 0 || self.default_limit == 0 {
            return Err(RankingError::Configuration(
                "diversity.pool_multiplier and diversity.default_limit must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a scoring run needs, passed explicitly into each stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub vectorization: VectorizationConfig,
    pub scoring: ScoringWeights,
    pub popularity: PopularityWeights,
    pub segment_boosts: SegmentBoostTable,
    pub cold_start: ColdStartThresholds,
    pub diversity: DiversityConfig,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RankingConfig {
    /// Built-in defaults with the production segment boost table
    pub fn standard() -> Self {
        Self {
            vectorization: VectorizationConfig::default(),
            scoring: ScoringWeights::default(),
            popularity: PopularityWeights::default(),
            segment_boosts: SegmentBoostTable::standard(),
            cold_start: ColdStartThresholds::default(),
            diversity: DiversityConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.vectorization.validate()?;
        self.scoring.validate()?;
        self.popularity.validate()?;
        self.segment_boosts.validate()?;
        self.cold_start.validate()?;
        self.diversity.validate()?;
        Ok(())
    }

    /// Load and validate a JSON config; absent sections fall back to defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RankingError::Configuration(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: RankingConfig = serde_json::from_str(&raw)
            .map_err(|e| RankingError::Configuration(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

/// A config version pinned by a scoring run.
///
/// `version` counts updates within this process and is only meaningful in
/// logs. `fingerprint` identifies the config content and is what shared
/// cache entries are validated against.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub fingerprint: String,
    pub config: Arc<RankingConfig>,
}

impl ConfigSnapshot {
    fn new(version: u64, config: RankingConfig) -> Self {
        Self {
            version,
            fingerprint: content_fingerprint(&config),
            config: Arc::new(config),
        }
    }
}

/// Hot-swappable holder of the current ranking config
pub struct ConfigStore {
    current: RwLock<ConfigSnapshot>,
}

impl ConfigStore {
    pub fn new(config: RankingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(ConfigSnapshot::new(1, config)),
        })
    }

    /// Config for a run about to start
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.current.read().clone()
    }

    /// Validate and publish a new config; runs holding older snapshots are unaffected
    pub fn update(&self, config: RankingConfig) -> Result<u64> {
        config.validate()?;
        let mut current = self.current.write();
        *current = ConfigSnapshot::new(current.version + 1, config);
        info!(
            version = current.version,
            fingerprint = %current.fingerprint,
            "Ranking config updated"
        );
        Ok(current.version)
    }
}
