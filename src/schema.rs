//! Collection schemas: declared fields, primary key and vector field

use crate::distance::MetricType;
use crate::error::{Result, VectorDbError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MAX_NAME_LEN: usize = 255;

/// Field data types understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int64,
    Float,
    VarChar { max_length: usize },
    FloatVector { dim: usize },
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_primary: false,
            auto_id: false,
            description: String::new(),
        }
    }

    /// An `Int64` primary key field.
    pub fn primary(name: impl Into<String>, auto_id: bool) -> Self {
        Self {
            is_primary: true,
            auto_id,
            ..Self::new(name, DataType::Int64)
        }
    }

    /// A `FloatVector` field of the given dimension.
    pub fn vector(name: impl Into<String>, dim: usize) -> Self {
        Self::new(name, DataType::FloatVector { dim })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ordered list of fields plus collection-level options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub description: String,
    /// Accept undeclared scalar fields on insert (stored alongside the
    /// declared ones).
    #[serde(default = "default_dynamic")]
    pub enable_dynamic_field: bool,
    #[serde(default)]
    pub metric: MetricType,
}

fn default_dynamic() -> bool {
    true
}

impl CollectionSchema {
    pub fn new(fields: Vec<FieldSchema>, description: impl Into<String>) -> Self {
        Self {
            fields,
            description: description.into(),
            enable_dynamic_field: true,
            metric: MetricType::default(),
        }
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_dynamic_field(mut self, enabled: bool) -> Self {
        self.enable_dynamic_field = enabled;
        self
    }

    /// Check the structural rules every collection schema must satisfy.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(VectorDbError::schema("field name must not be empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(VectorDbError::schema(format!(
                    "duplicate field name `{}`",
                    field.name
                )));
            }
            if field.auto_id && !field.is_primary {
                return Err(VectorDbError::schema(format!(
                    "auto_id set on non-primary field `{}`",
                    field.name
                )));
            }
            match field.data_type {
                DataType::FloatVector { dim: 0 } => {
                    return Err(VectorDbError::schema(format!(
                        "vector field `{}` must have a positive dimension",
                        field.name
                    )));
                }
                DataType::VarChar { max_length: 0 } => {
                    return Err(VectorDbError::schema(format!(
                        "varchar field `{}` must have a positive max_length",
                        field.name
                    )));
                }
                _ => {}
            }
        }

        let primaries: Vec<&FieldSchema> = self.fields.iter().filter(|f| f.is_primary).collect();
        match primaries.as_slice() {
            [pk] if pk.data_type == DataType::Int64 => {}
            [pk] => {
                return Err(VectorDbError::schema(format!(
                    "primary key `{}` must be Int64",
                    pk.name
                )));
            }
            [] => return Err(VectorDbError::schema("schema has no primary key")),
            _ => return Err(VectorDbError::schema("schema has more than one primary key")),
        }

        match self.vector_fields().count() {
            1 => Ok(()),
            0 => Err(VectorDbError::schema("schema has no vector field")),
            _ => Err(VectorDbError::schema("schema has more than one vector field")),
        }
    }

    fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields
            .iter()
            .filter(|f| matches!(f.data_type, DataType::FloatVector { .. }))
    }

    /// The primary key field. Only meaningful on a validated schema.
    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// The vector field. Only meaningful on a validated schema.
    pub fn vector_field(&self) -> Option<&FieldSchema> {
        self.vector_fields().next()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vector_field().and_then(|f| match f.data_type {
            DataType::FloatVector { dim } => Some(dim),
            _ => None,
        })
    }

    pub fn auto_id(&self) -> bool {
        self.primary_field().map(|f| f.auto_id).unwrap_or(false)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Validate a collection name: `[A-Za-z_][A-Za-z0-9_]*`, at most 255 chars.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || name.len() > MAX_NAME_LEN {
        return Err(VectorDbError::schema(format!(
            "invalid collection name `{}`",
            name
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(VectorDbError::schema(format!(
            "invalid character `{}` in collection name `{}`",
            bad, name
        )));
    }
    Ok(())
}

/// A created collection as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub schema: CollectionSchema,
    pub row_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_schema() -> CollectionSchema {
        CollectionSchema::new(
            vec![FieldSchema::primary("id", false), FieldSchema::vector("vector", 768)],
            "Demo collection for vector search",
        )
    }

    #[test]
    fn test_valid_schema() {
        let schema = demo_schema();
        schema.validate().unwrap();
        assert_eq!(schema.dimension(), Some(768));
        assert_eq!(schema.primary_field().unwrap().name, "id");
        assert!(!schema.auto_id());
        assert!(schema.enable_dynamic_field);
    }

    #[test]
    fn test_missing_primary_key() {
        let schema = CollectionSchema::new(vec![FieldSchema::vector("vector", 4)], "");
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_two_primary_keys() {
        let schema = CollectionSchema::new(
            vec![
                FieldSchema::primary("id", false),
                FieldSchema::primary("other", false),
                FieldSchema::vector("vector", 4),
            ],
            "",
        );
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_missing_vector_field() {
        let schema = CollectionSchema::new(vec![FieldSchema::primary("id", true)], "");
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_two_vector_fields() {
        let schema = CollectionSchema::new(
            vec![
                FieldSchema::primary("id", true),
                FieldSchema::vector("a", 4),
                FieldSchema::vector("b", 4),
            ],
            "",
        );
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_zero_dimension() {
        let schema = CollectionSchema::new(
            vec![FieldSchema::primary("id", true), FieldSchema::vector("vector", 0)],
            "",
        );
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_non_integer_primary_key() {
        let mut pk = FieldSchema::primary("id", false);
        pk.data_type = DataType::VarChar { max_length: 64 };
        let schema = CollectionSchema::new(vec![pk, FieldSchema::vector("vector", 4)], "");
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_duplicate_field_names() {
        let schema = CollectionSchema::new(
            vec![FieldSchema::primary("id", true), FieldSchema::vector("id", 4)],
            "",
        );
        assert!(matches!(schema.validate(), Err(VectorDbError::Schema { .. })));
    }

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("demo_collection").is_ok());
        assert!(validate_collection_name("_c1").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("1abc").is_err());
        assert!(validate_collection_name("has-dash").is_err());
        assert!(validate_collection_name(&"a".repeat(256)).is_err());
    }
}
