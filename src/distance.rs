//! Similarity metrics for ranking search hits
//!
//! Every metric here is a similarity: higher scores mean closer vectors,
//! and search results are ordered by descending score.

use crate::error::{Result, VectorDbError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Similarity metric declared on a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricType {
    /// Cosine similarity, in [-1, 1]
    #[default]
    Cosine,
    /// Raw dot product
    InnerProduct,
}

impl MetricType {
    /// Compute the similarity between two vectors using this metric
    pub fn score(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        if !v1.has_same_dimension(v2) {
            return Err(VectorDbError::DimensionMismatch {
                expected: v1.dimension(),
                actual: v2.dimension(),
            });
        }

        match self {
            MetricType::Cosine => cosine_similarity(v1, v2),
            MetricType::InnerProduct => Ok(dot_product(v1, v2)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cosine => "COSINE",
            MetricType::InnerProduct => "IP",
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Accumulates in f64: finite f32 components cannot overflow it, so the
/// result is never NaN.
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> Result<f32> {
    let norm1 = dot_f64(v1.as_slice(), v1.as_slice()).sqrt();
    let norm2 = dot_f64(v2.as_slice(), v2.as_slice()).sqrt();

    if norm1 == 0.0 || norm2 == 0.0 {
        return Err(VectorDbError::InvalidVector {
            reason: "Cannot compute cosine similarity with zero vector".to_string(),
        });
    }

    let similarity = dot_f64(v1.as_slice(), v2.as_slice()) / (norm1 * norm2);

    // Clamp to [-1, 1] to handle floating point errors
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Compute dot product of two vectors. Out-of-range results saturate to
/// infinity rather than NaN.
pub fn dot_product(v1: &Vector, v2: &Vector) -> f32 {
    dot_f64(v1.as_slice(), v2.as_slice()) as f32
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum()
}
