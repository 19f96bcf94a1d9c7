//! The vector database service contract and its implementations.
//!
//! Every call is a blocking request/response. Filters travel as expression
//! strings and are evaluated by the service, never by the caller.

pub mod local;
pub mod remote;

use crate::entity::{Entity, Hit, Row};
use crate::error::Result;
use crate::schema::{CollectionInfo, CollectionSchema};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Parameters of a nearest-neighbour search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// One result list is returned per query vector.
    pub data: Vec<Vector>,
    pub limit: usize,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl SearchRequest {
    pub fn new(data: Vec<Vector>, limit: usize) -> Self {
        Self {
            data,
            limit,
            output_fields: Vec::new(),
            filter: None,
        }
    }

    pub fn output_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }
}

/// Outcome of an insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub insert_count: usize,
    /// Primary keys in input order, including ones the service assigned.
    pub insert_ids: Vec<i64>,
}

/// A vector database service reachable from this process.
pub trait VectorBackend: Send + Sync {
    /// Create a collection. Creating an existing name with an identical
    /// schema returns the existing collection.
    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<CollectionInfo>;

    /// Drop a collection. Returns `false` when it did not exist.
    fn drop_collection(&self, name: &str) -> Result<bool>;

    fn has_collection(&self, name: &str) -> Result<bool>;

    fn list_collections(&self) -> Result<Vec<String>>;

    /// Schema and current row count.
    fn describe_collection(&self, name: &str) -> Result<CollectionInfo>;

    fn insert(&self, collection: &str, entities: Vec<Entity>) -> Result<InsertResult>;

    /// Remove rows by primary key; returns how many existed.
    fn delete_by_ids(&self, collection: &str, ids: &[i64]) -> Result<usize>;

    /// Remove rows matching a filter expression; returns how many.
    fn delete_by_filter(&self, collection: &str, filter: &str) -> Result<usize>;

    fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<Vec<Hit>>>;

    fn query_by_filter(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> Result<Vec<Row>>;

    fn query_by_ids(
        &self,
        collection: &str,
        ids: &[i64],
        output_fields: &[String],
    ) -> Result<Vec<Row>>;

    /// Make every acknowledged mutation durable. A no-op where the service
    /// already guarantees it.
    fn flush(&self) -> Result<()>;
}
