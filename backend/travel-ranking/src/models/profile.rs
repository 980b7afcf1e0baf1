use super::FeatureVector;
use crate::error::{RankingError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Behavioral segment, the first key of the segment boost table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserSegment {
    BudgetBackpacker,
    FamilyExplorer,
    LuxuryTraveler,
    AdventureSeeker,
    CulturalEnthusiast,
    RomanticCouple,
    BusinessTraveler,
    SeniorComfort,
}

impl UserSegment {
    pub const ALL: [UserSegment; 8] = [
        UserSegment::BudgetBackpacker,
        UserSegment::FamilyExplorer,
        UserSegment::LuxuryTraveler,
        UserSegment::AdventureSeeker,
        UserSegment::CulturalEnthusiast,
        UserSegment::RomanticCouple,
        UserSegment::BusinessTraveler,
        UserSegment::SeniorComfort,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserSegment::BudgetBackpacker => "budget_backpacker",
            UserSegment::FamilyExplorer => "family_explorer",
            UserSegment::LuxuryTraveler => "luxury_traveler",
            UserSegment::AdventureSeeker => "adventure_seeker",
            UserSegment::CulturalEnthusiast => "cultural_enthusiast",
            UserSegment::RomanticCouple => "romantic_couple",
            UserSegment::BusinessTraveler => "business_traveler",
            UserSegment::SeniorComfort => "senior_comfort",
        }
    }
}

/// Profile data quality, both figures in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f32,
    pub confidence: f32,
}

impl DataQuality {
    pub fn new(completeness: f32, confidence: f32) -> Self {
        Self {
            completeness,
            confidence,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("completeness", self.completeness),
            ("confidence", self.confidence),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(RankingError::InvalidInput(format!(
                    "{} must be within [0, 100], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// User preference profile, derived externally and consumed read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    #[serde(default)]
    pub segment: Option<UserSegment>,
    #[serde(default)]
    pub preference_vector: Option<FeatureVector>,
    #[serde(default)]
    pub data_quality: DataQuality,
    #[serde(default)]
    pub onboarding_completed: bool,
}

impl UserProfile {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            segment: None,
            preference_vector: None,
            data_quality: DataQuality::default(),
            onboarding_completed: false,
        }
    }

    /// Preference vector with at least one non-neutral dimension
    pub fn usable_vector(&self) -> Option<&FeatureVector> {
        self.preference_vector.as_ref().filter(|v| !v.is_neutral())
    }
}
