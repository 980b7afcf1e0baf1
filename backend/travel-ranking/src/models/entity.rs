use crate::error::{RankingError, Result};
use crate::utils::normalize_score;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Amenity indicators consumed by the vectorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Amenity {
    // Climate comfort
    Pool,
    AirConditioning,
    Heating,
    Sauna,
    HotTub,
    // Culture
    MuseumNearby,
    HistoricBuilding,
    GuidedTours,
    CulturalEvents,
    // Activity
    Gym,
    Spa,
    Hiking,
    WaterSports,
    BikeRental,
    // Group fit
    FamilyRooms,
    KidsClub,
    ConnectingRooms,
    // Setting
    PublicTransport,
    // Gastronomy
    Restaurant,
    FineDining,
    Bar,
    RoomService,
    BreakfastIncluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Accommodation,
    Destination,
}

/// Catalog category, the second key of the segment boost table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Hotel,
    Resort,
    Apartment,
    Hostel,
    Villa,
    Camping,
    City,
    Beach,
    Mountain,
    Countryside,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Hotel,
        Category::Resort,
        Category::Apartment,
        Category::Hostel,
        Category::Villa,
        Category::Camping,
        Category::City,
        Category::Beach,
        Category::Mountain,
        Category::Countryside,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hotel => "hotel",
            Category::Resort => "resort",
            Category::Apartment => "apartment",
            Category::Hostel => "hostel",
            Category::Villa => "villa",
            Category::Camping => "camping",
            Category::City => "city",
            Category::Beach => "beach",
            Category::Mountain => "mountain",
            Category::Countryside => "countryside",
        }
    }
}

/// Urban/rural setting of the entity's location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    Urban,
    Suburban,
    Coastal,
    Rural,
    Remote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub setting: Option<Setting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    /// Average rating on `scale`
    pub average: f32,
    #[serde(default = "RatingAggregate::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub review_count: u32,
}

impl RatingAggregate {
    pub const DEFAULT_SCALE: f32 = 10.0;

    fn default_scale() -> f32 {
        Self::DEFAULT_SCALE
    }

    /// Average rating mapped to [0, 1]
    pub fn normalized(&self) -> f32 {
        normalize_score(self.average, 0.0, self.scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Nightly price (accommodation) or average daily cost (destination)
    pub amount: f32,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capacity {
    pub max_guests: u32,
    #[serde(default)]
    pub rooms: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Freshness {
    #[serde(default)]
    pub new_opening: bool,
    #[serde(default)]
    pub recently_renovated: bool,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub renovated_at: Option<DateTime<Utc>>,
}

impl Freshness {
    /// Any freshness information present at all
    pub fn has_signal(&self) -> bool {
        self.new_opening
            || self.recently_renovated
            || self.opened_at.is_some()
            || self.renovated_at.is_some()
    }
}

/// Accommodation or destination from the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: EntityKind,
    pub category: Category,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub amenities: BTreeSet<Amenity>,
    #[serde(default)]
    pub rating: Option<RatingAggregate>,
    /// Official star classification, 0..=5
    #[serde(default)]
    pub star_rating: Option<u8>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub capacity: Option<Capacity>,
    #[serde(default)]
    pub freshness: Freshness,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, category: Category) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind,
            category,
            location: Location::default(),
            amenities: BTreeSet::new(),
            rating: None,
            star_rating: None,
            price: None,
            capacity: None,
            freshness: Freshness::default(),
        }
    }

    pub fn has_amenity(&self, amenity: Amenity) -> bool {
        self.amenities.contains(&amenity)
    }

    /// Structural checks; missing attributes are fine, contradictory ones are not
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RankingError::InvalidInput(
                "entity id must not be empty".to_string(),
            ));
        }

        if let Some(rating) = &self.rating {
            if !rating.scale.is_finite() || rating.scale <= 0.0 {
                return Err(RankingError::InvalidInput(format!(
                    "entity {}: rating scale must be positive, got {}",
                    self.id, rating.scale
                )));
            }
            if !rating.average.is_finite() || rating.average < 0.0 || rating.average > rating.scale
            {
                return Err(RankingError::InvalidInput(format!(
                    "entity {}: rating {} outside [0, {}]",
                    self.id, rating.average, rating.scale
                )));
            }
        }

        if let Some(stars) = self.star_rating {
            if stars > 5 {
                return Err(RankingError::InvalidInput(format!(
                    "entity {}: star rating {} above 5",
                    self.id, stars
                )));
            }
        }

        if let Some(price) = &self.price {
            if !price.amount.is_finite() || price.amount < 0.0 {
                return Err(RankingError::InvalidInput(format!(
                    "entity {}: invalid price {}",
                    self.id, price.amount
                )));
            }
            if price.currency.trim().is_empty() {
                return Err(RankingError::InvalidInput(format!(
                    "entity {}: price has no currency",
                    self.id
                )));
            }
        }

        Ok(())
    }

    /// Quality signal: normalized rating, else stars / 5
    pub fn quality_signal(&self) -> Option<f32> {
        self.rating
            .as_ref()
            .map(RatingAggregate::normalized)
            .or_else(|| self.star_rating.map(|s| s as f32 / 5.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel() -> Entity {
        Entity::new("hotel-1", EntityKind::Accommodation, Category::Hotel)
    }

    #[test]
    fn test_minimal_entity_is_valid() {
        assert!(hotel().validate().is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let entity = Entity::new("  ", EntityKind::Accommodation, Category::Hotel);
        assert!(matches!(
            entity.validate(),
            Err(RankingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rating_above_scale_rejected() {
        let mut entity = hotel();
        entity.rating = Some(RatingAggregate {
            average: 11.0,
            scale: 10.0,
            review_count: 3,
        });
        assert!(entity.validate().is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut entity = hotel();
        entity.price = Some(Price {
            amount: -5.0,
            currency: "EUR".to_string(),
        });
        assert!(entity.validate().is_err());
    }

    #[test]
    fn test_quality_signal_prefers_rating() {
        let mut entity = hotel();
        assert_eq!(entity.quality_signal(), None);

        entity.star_rating = Some(4);
        assert!((entity.quality_signal().unwrap() - 0.8).abs() < 1e-6);

        entity.rating = Some(RatingAggregate {
            average: 8.5,
            scale: 10.0,
            review_count: 200,
        });
        assert!((entity.quality_signal().unwrap() - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "id": "dest-7",
            "kind": "DESTINATION",
            "category": "BEACH",
            "amenities": ["POOL", "FINE_DINING"],
            "rating": {"average": 4.2, "scale": 5.0}
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.category, Category::Beach);
        assert!(entity.has_amenity(Amenity::FineDining));
        assert_eq!(entity.rating.as_ref().unwrap().review_count, 0);
        assert!(!entity.freshness.has_signal());
    }
}
