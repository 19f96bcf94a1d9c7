//! The client object and the components that borrow it.
//!
//! A [`VectorClient`] is created once, handed by reference to whatever needs
//! the database, and closed explicitly:
//!
//! ```no_run
//! use vectordb_walkthrough::{ClientConfig, VectorClient};
//!
//! let client = VectorClient::connect(&ClientConfig::default())?;
//! for name in client.collections().list()? {
//!     println!("{}", name);
//! }
//! client.close()?;
//! # Ok::<(), vectordb_walkthrough::VectorDbError>(())
//! ```

use crate::backend::{InsertResult, LocalBackend, RemoteBackend, SearchRequest, VectorBackend};
use crate::backend::local::LocalConfig;
use crate::config::{ClientConfig, ConnectionConfig, DropPolicy};
use crate::entity::{Entity, Hit, Row};
use crate::error::{Result, VectorDbError};
use crate::schema::{CollectionInfo, CollectionSchema};
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to a vector database service.
pub struct VectorClient {
    backend: Arc<dyn VectorBackend>,
    drop_policy: DropPolicy,
}

impl VectorClient {
    /// Open the backend described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let backend: Arc<dyn VectorBackend> = match &config.connection {
            ConnectionConfig::InMemory => Arc::new(LocalBackend::in_memory()),
            ConnectionConfig::Local {
                path,
                checkpoint_interval,
            } => Arc::new(LocalBackend::open(
                path,
                LocalConfig {
                    checkpoint_interval: *checkpoint_interval,
                },
            )?),
            ConnectionConfig::Remote { uri, timeout } => {
                Arc::new(RemoteBackend::connect(uri, *timeout)?)
            }
        };
        info!(connection = ?config.connection, drop_policy = ?config.drop_policy, "client connected");
        Ok(Self::with_backend(backend, config.drop_policy))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Arc<dyn VectorBackend>, drop_policy: DropPolicy) -> Self {
        Self {
            backend,
            drop_policy,
        }
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    pub fn collections(&self) -> CollectionManager<'_> {
        CollectionManager { client: self }
    }

    pub fn records(&self) -> RecordStore<'_> {
        RecordStore { client: self }
    }

    pub fn queries(&self) -> QueryEngine<'_> {
        QueryEngine { client: self }
    }

    /// Flush outstanding state and release the connection.
    pub fn close(self) -> Result<()> {
        self.backend.flush()?;
        info!("client closed");
        Ok(())
    }
}

/// Collection lifecycle operations.
pub struct CollectionManager<'a> {
    client: &'a VectorClient,
}

impl<'a> CollectionManager<'a> {
    /// Create `name` with `schema`. An existing collection with the same
    /// schema is returned as is; a different schema is a `Schema` error.
    pub fn create(&self, name: &str, schema: &CollectionSchema) -> Result<CollectionInfo> {
        debug!(collection = name, "create collection");
        self.client.backend.create_collection(name, schema)
    }

    /// Drop `name`. Returns whether it existed; under
    /// [`DropPolicy::Strict`] a missing collection is `NotFound`.
    pub fn drop(&self, name: &str) -> Result<bool> {
        debug!(collection = name, "drop collection");
        let dropped = self.client.backend.drop_collection(name)?;
        if !dropped && self.client.drop_policy == DropPolicy::Strict {
            return Err(VectorDbError::collection_not_found(name));
        }
        Ok(dropped)
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        self.client.backend.has_collection(name)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.client.backend.list_collections()
    }

    pub fn describe(&self, name: &str) -> Result<CollectionInfo> {
        self.client.backend.describe_collection(name)
    }
}

/// Writes: insert and delete.
pub struct RecordStore<'a> {
    client: &'a VectorClient,
}

impl<'a> RecordStore<'a> {
    /// Insert a batch. The whole batch is rejected if any entity is invalid.
    pub fn insert(&self, collection: &str, entities: Vec<Entity>) -> Result<InsertResult> {
        debug!(collection, count = entities.len(), "insert");
        self.client.backend.insert(collection, entities)
    }

    /// Delete by primary key; ids that are not present are ignored.
    pub fn delete_by_ids(&self, collection: &str, ids: &[i64]) -> Result<usize> {
        debug!(collection, ?ids, "delete by ids");
        self.client.backend.delete_by_ids(collection, ids)
    }

    pub fn delete_by_filter(&self, collection: &str, filter: &str) -> Result<usize> {
        debug!(collection, filter, "delete by filter");
        self.client.backend.delete_by_filter(collection, filter)
    }
}

/// Reads: similarity search and exact lookups.
pub struct QueryEngine<'a> {
    client: &'a VectorClient,
}

impl<'a> QueryEngine<'a> {
    /// Nearest neighbours for each query vector, best first.
    pub fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<Vec<Hit>>> {
        debug!(
            collection,
            queries = request.data.len(),
            limit = request.limit,
            filter = request.filter.as_deref().unwrap_or(""),
            "search"
        );
        self.client.backend.search(collection, request)
    }

    /// Every row matching `filter`, ascending by id. An empty filter
    /// matches all rows.
    pub fn query_by_filter(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        debug!(collection, filter, "query by filter");
        self.client
            .backend
            .query_by_filter(collection, filter, output_fields)
    }

    /// Rows for `ids` in request order; unknown ids are omitted.
    pub fn query_by_ids(
        &self,
        collection: &str,
        ids: &[i64],
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        debug!(collection, ?ids, "query by ids");
        self.client
            .backend
            .query_by_ids(collection, ids, output_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn client(policy: DropPolicy) -> VectorClient {
        VectorClient::with_backend(Arc::new(LocalBackend::in_memory()), policy)
    }

    fn schema() -> CollectionSchema {
        CollectionSchema::new(
            vec![FieldSchema::primary("id", false), FieldSchema::vector("vector", 3)],
            "",
        )
    }

    #[test]
    fn test_lenient_drop_of_missing_collection() {
        let client = client(DropPolicy::Lenient);
        assert!(!client.collections().drop("missing").unwrap());
    }

    #[test]
    fn test_strict_drop_of_missing_collection() {
        let client = client(DropPolicy::Strict);
        client.collections().create("docs", &schema()).unwrap();
        assert!(client.collections().drop("docs").unwrap());
        assert!(matches!(
            client.collections().drop("docs"),
            Err(VectorDbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_connect_in_memory_and_close() {
        let client = VectorClient::connect(&ClientConfig {
            connection: ConnectionConfig::InMemory,
            drop_policy: DropPolicy::Lenient,
        })
        .unwrap();
        client.collections().create("docs", &schema()).unwrap();
        assert_eq!(client.collections().list().unwrap(), vec!["docs".to_string()]);
        client.close().unwrap();
    }

    #[test]
    fn test_components_share_one_backend() {
        let client = client(DropPolicy::Lenient);
        client.collections().create("docs", &schema()).unwrap();
        client
            .records()
            .insert("docs", vec![Entity::new(1, vec![1.0, 0.0, 0.0])])
            .unwrap();
        let rows = client.queries().query_by_ids("docs", &[1], &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(client.collections().describe("docs").unwrap().row_count, 1);
    }
}
