use crate::error::{RankingError, Result};
use crate::utils::{clamp01, cosine_similarity};
use serde::{Deserialize, Serialize};

/// Number of dimensions shared by user preference and entity vectors
pub const DIMENSIONS: usize = 8;

/// Named dimensions, in their fixed vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Climate,
    /// Culture vs nature affinity
    Culture,
    Budget,
    Activity,
    GroupSize,
    /// Urban vs rural setting
    Urban,
    Gastronomy,
    Popularity,
}

impl Dimension {
    pub const ALL: [Dimension; DIMENSIONS] = [
        Dimension::Climate,
        Dimension::Culture,
        Dimension::Budget,
        Dimension::Activity,
        Dimension::GroupSize,
        Dimension::Urban,
        Dimension::Gastronomy,
        Dimension::Popularity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Climate => "climate",
            Dimension::Culture => "culture",
            Dimension::Budget => "budget",
            Dimension::Activity => "activity",
            Dimension::GroupSize => "group_size",
            Dimension::Urban => "urban",
            Dimension::Gastronomy => "gastronomy",
            Dimension::Popularity => "popularity",
        }
    }

    /// Phrase used in human-readable reasons ("matches your preferred ...")
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Climate => "climate",
            Dimension::Culture => "cultural experiences",
            Dimension::Budget => "budget level",
            Dimension::Activity => "activity level",
            Dimension::GroupSize => "group size",
            Dimension::Urban => "setting",
            Dimension::Gastronomy => "food and dining",
            Dimension::Popularity => "kind of popular places",
        }
    }
}

/// Fixed 8-dimension vector with every component in [0, 1].
///
/// Construction always clamps, so a `FeatureVector` can never hold an
/// out-of-range or NaN component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct FeatureVector([f32; DIMENSIONS]);

impl FeatureVector {
    pub fn new(values: [f32; DIMENSIONS]) -> Self {
        Self(values.map(clamp01))
    }

    pub fn zeros() -> Self {
        Self([0.0; DIMENSIONS])
    }

    /// Build from a slice, rejecting any length other than 8
    pub fn try_from_slice(values: &[f32]) -> Result<Self> {
        let array: [f32; DIMENSIONS] =
            values
                .try_into()
                .map_err(|_| RankingError::DimensionMismatch {
                    expected: DIMENSIONS,
                    actual: values.len(),
                })?;
        Ok(Self::new(array))
    }

    pub fn get(&self, dimension: Dimension) -> f32 {
        self.0[dimension.index()]
    }

    pub fn as_array(&self) -> &[f32; DIMENSIONS] {
        &self.0
    }

    pub fn magnitude(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// All dimensions at the neutral value (no usable signal)
    pub fn is_neutral(&self) -> bool {
        self.0.iter().all(|&x| x == 0.0)
    }

    /// Cosine similarity; 0 when either vector has zero magnitude
    pub fn cosine_similarity(&self, other: &FeatureVector) -> f32 {
        cosine_similarity(&self.0, &other.0)
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = RankingError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::try_from_slice(&values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(vector: FeatureVector) -> Self {
        vector.0.to_vec()
    }
}
