//! Serialization utilities: bincode for the log and snapshots, JSON for the manifest.

use crate::collection::Collection;
use crate::error::{Result, VectorDbError};
use serde::{Deserialize, Serialize};

/// Serializable representation of every collection in a local database.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub collections: Vec<Collection>,
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| VectorDbError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| VectorDbError::SerializationError(e.to_string()))
}
