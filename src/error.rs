//! Error types for the vector database client

use thiserror::Error;

/// Result type alias for client and backend operations
pub type Result<T> = std::result::Result<T, VectorDbError>;

/// Error types that can occur while talking to the vector database
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Duplicate primary key {id} in collection {collection}")]
    DuplicateKey { collection: String, id: i64 },

    /// Raised by the real embedding backend. `Embedder` catches it and
    /// answers from the fallback generator instead.
    #[error("Embedding backend unavailable: {reason}")]
    EmbeddingUnavailable { reason: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl VectorDbError {
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema {
            reason: reason.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn collection_not_found(name: &str) -> Self {
        Self::not_found(format!("collection {}", name))
    }

    /// Numeric code carried in the HTTP envelope for this error kind.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 100,
            Self::Schema { .. } => 1100,
            Self::DuplicateKey { .. } => 1101,
            Self::DimensionMismatch { .. } => 1102,
            Self::InvalidVector { .. } => 1103,
            _ => 1,
        }
    }

    /// Message sent in the HTTP envelope. `from_code` wraps it back into
    /// the same kind, so the kind prefix is left off.
    pub fn message(&self) -> String {
        match self {
            Self::Schema { reason } | Self::InvalidVector { reason } => reason.clone(),
            Self::NotFound { what } => what.clone(),
            Self::Backend { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Structured fields sent next to the code, for kinds that have them.
    pub fn detail(&self) -> Option<serde_json::Value> {
        match self {
            Self::DuplicateKey { collection, id } => {
                Some(serde_json::json!({ "collection": collection, "id": id }))
            }
            Self::DimensionMismatch { expected, actual } => {
                Some(serde_json::json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
        }
    }

    /// Rebuild a typed error from an envelope code, message and detail.
    pub fn from_code(code: i32, message: String, detail: Option<&serde_json::Value>) -> Self {
        let field = |name: &str| detail.and_then(|d| d.get(name));
        match code {
            100 => Self::NotFound { what: message },
            1100 => Self::Schema { reason: message },
            1101 => match (
                field("collection").and_then(|v| v.as_str()),
                field("id").and_then(|v| v.as_i64()),
            ) {
                (Some(collection), Some(id)) => Self::DuplicateKey {
                    collection: collection.to_string(),
                    id,
                },
                _ => Self::Backend { message },
            },
            1102 => match (
                field("expected").and_then(|v| v.as_u64()),
                field("actual").and_then(|v| v.as_u64()),
            ) {
                (Some(expected), Some(actual)) => Self::DimensionMismatch {
                    expected: expected as usize,
                    actual: actual as usize,
                },
                _ => Self::Backend { message },
            },
            1103 => Self::InvalidVector { reason: message },
            _ => Self::Backend { message },
        }
    }
}

impl From<reqwest::Error> for VectorDbError {
    fn from(e: reqwest::Error) -> Self {
        Self::backend(e.to_string())
    }
}

impl From<serde_json::Error> for VectorDbError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_back_to_kinds() {
        let err = VectorDbError::collection_not_found("docs");
        let back = VectorDbError::from_code(err.code(), err.message(), None);
        assert_eq!(back.to_string(), err.to_string());

        let err = VectorDbError::schema("two primary keys");
        let back = VectorDbError::from_code(err.code(), "two primary keys".to_string(), None);
        assert!(matches!(back, VectorDbError::Schema { reason } if reason == "two primary keys"));
    }

    #[test]
    fn test_structured_kinds_survive_the_envelope() {
        let err = VectorDbError::DuplicateKey {
            collection: "docs".to_string(),
            id: 7,
        };
        let detail = err.detail();
        let back = VectorDbError::from_code(err.code(), err.to_string(), detail.as_ref());
        assert!(matches!(back, VectorDbError::DuplicateKey { id: 7, .. }));

        let err = VectorDbError::DimensionMismatch {
            expected: 768,
            actual: 3,
        };
        let detail = err.detail();
        let back = VectorDbError::from_code(err.code(), err.to_string(), detail.as_ref());
        assert!(matches!(
            back,
            VectorDbError::DimensionMismatch { expected: 768, actual: 3 }
        ));
    }

    #[test]
    fn test_unknown_code_is_backend_error() {
        let back = VectorDbError::from_code(65535, "connection reset".to_string(), None);
        assert!(matches!(back, VectorDbError::Backend { message } if message == "connection reset"));
    }
}
