//! Vector type and operations

use crate::error::{Result, VectorDbError};
use serde::{Deserialize, Serialize};

/// A dense float vector, as stored in a `FloatVector` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.data
            .iter()
            .map(|x| *x as f64 * *x as f64)
            .sum::<f64>()
            .sqrt() as f32
    }

    /// Check the vector against a declared dimension and reject NaN/inf
    /// components.
    pub fn validate(&self, dim: usize) -> Result<()> {
        if self.dimension() != dim {
            return Err(VectorDbError::DimensionMismatch {
                expected: dim,
                actual: self.dimension(),
            });
        }
        if let Some(pos) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(VectorDbError::InvalidVector {
                reason: format!("component {} is not finite", pos),
            });
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}
