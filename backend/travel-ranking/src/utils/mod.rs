// Numeric helpers shared by the vectorizer, popularity engine and scorer,
// plus the content fingerprint used to validate cache entries

use serde::Serialize;
use uuid::Uuid;

/// Saturate to [0, 1]; NaN maps to 0
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Normalize a score to [0, 1] range
pub fn normalize_score(score: f32, min: f32, max: f32) -> f32 {
    if max - min < f32::EPSILON {
        0.5
    } else {
        ((score - min) / (max - min)).clamp(0.0, 1.0)
    }
}

/// Log-damped volume: ln(1 + count) / ln(1 + reference), saturated at 1
pub fn log_damp(count: u32, reference: u32) -> f32 {
    if reference == 0 {
        return if count > 0 { 1.0 } else { 0.0 };
    }
    clamp01(((count as f32).ln_1p()) / ((reference as f32).ln_1p()))
}

/// Linear decay from 1.0 at age 0 down to 0.0 at `window_days`
pub fn linear_decay(age_days: f32, window_days: f32) -> f32 {
    if window_days <= 0.0 || age_days >= window_days {
        return 0.0;
    }
    clamp01(1.0 - age_days.max(0.0) / window_days)
}

/// Cosine similarity in [-1, 1]; zero-magnitude input yields 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensionality must match");
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Stable identifier of a value's content: UUIDv5 over its JSON encoding.
/// Equal content yields the same fingerprint in every process.
pub fn content_fingerprint<T: Serialize + ?Sized>(value: &T) -> String {
    let canonical = serde_json::to_vec(value).unwrap_or_default();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &canonical)
        .simple()
        .to_string()
}
