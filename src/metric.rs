//! Metric kernel: vector arithmetic and distance/similarity adapters.
//!
//! Three pure functions over equal-length slices of finite reals, plus the
//! [`Metric`] enum that maps each of them onto the "lower distance is better"
//! convention used inside the HNSW index and back onto a reported similarity.

use crate::error::{MeaningError, Result};
use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
///
/// All metrics produce a distance where **lower is better** (more similar);
/// [`Metric::similarity_from_distance`] converts back for reporting. The
/// conversions preserve the monotone relationship between the two quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    DotProduct,
}

impl Default for Metric {
    fn default() -> Self {
        Metric::Cosine
    }
}

impl Metric {
    /// Distance between two equal-width vectors under this metric.
    ///
    /// Widths must already be validated at the boundary.
    #[inline]
    pub(crate) fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Metric::Cosine => 1.0 - cosine_unchecked(a, b),
            Metric::Euclidean => euclidean_unchecked(a, b),
            Metric::DotProduct => -dot_unchecked(a, b),
        }
    }

    /// Convert an internal distance back to the reported similarity.
    #[inline]
    pub fn similarity_from_distance(&self, distance: f32) -> f32 {
        match self {
            Metric::Cosine => 1.0 - distance,
            Metric::Euclidean => 1.0 / (1.0 + distance),
            Metric::DotProduct => -distance,
        }
    }
}

/// Cosine similarity between two vectors: `Σaᵢbᵢ / (‖a‖·‖b‖)`.
///
/// Returns 0.0 when either magnitude is (numerically) zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    check_widths(a, b)?;
    Ok(cosine_unchecked(a, b))
}

/// Euclidean (L2) distance between two vectors: `√Σ(aᵢ−bᵢ)²`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    check_widths(a, b)?;
    Ok(euclidean_unchecked(a, b))
}

/// Dot product between two vectors: `Σaᵢbᵢ`.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    check_widths(a, b)?;
    Ok(dot_unchecked(a, b))
}

/// Validate an embedding at the boundary.
///
/// Rejects empty vectors, non-finite elements, vectors wider than
/// [`crate::config::MAX_DIMENSION`], and (when `expected` is given) vectors
/// of the wrong width.
pub fn validate_embedding(embedding: &[f32], expected: Option<usize>) -> Result<()> {
    if embedding.is_empty() {
        return Err(MeaningError::InvalidEmbedding("embedding is empty".into()));
    }
    if embedding.len() > crate::config::MAX_DIMENSION {
        return Err(MeaningError::InvalidEmbedding(format!(
            "embedding width {} exceeds maximum {}",
            embedding.len(),
            crate::config::MAX_DIMENSION
        )));
    }
    if let Some((i, v)) = embedding
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(MeaningError::InvalidEmbedding(format!(
            "non-finite element {v} at position {i}"
        )));
    }
    if let Some(expected) = expected {
        if embedding.len() != expected {
            return Err(MeaningError::InvalidEmbedding(format!(
                "expected width {expected}, got {}",
                embedding.len()
            )));
        }
    }
    Ok(())
}

fn check_widths(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(MeaningError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

fn cosine_unchecked(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    dot / denom
}

fn euclidean_unchecked(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum.sqrt()
}

fn dot_unchecked(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}
