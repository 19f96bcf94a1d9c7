//! Blocking HTTP client for a vector database served by `vectordb-walkthrough serve`.

use crate::backend::{InsertResult, SearchRequest, VectorBackend};
use crate::entity::{Entity, Hit, Row};
use crate::error::{Result, VectorDbError};
use crate::schema::{CollectionInfo, CollectionSchema};
use crate::wire::{
    CollectionNameRequest, CreateCollectionRequest, DeleteRequest, DeleteResponse, DropResponse,
    Envelope, GetRequest, HasResponse, InsertRequest, QueryRequest, SearchBody,
};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// A vector database reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base_url: String,
    http: Client,
}

impl RemoteBackend {
    /// Connect to `uri` (e.g. `http://localhost:19530`) and check that the
    /// service answers its health probe.
    pub fn connect(uri: &str, timeout: Duration) -> Result<Self> {
        let base_url = uri.trim_end_matches('/').to_string();
        let http = Client::builder().timeout(timeout).build()?;

        let response = http
            .get(format!("{}/health", base_url))
            .send()
            .map_err(|e| VectorDbError::backend(format!("cannot reach {}: {}", base_url, e)))?;
        if !response.status().is_success() {
            return Err(VectorDbError::backend(format!(
                "health check against {} failed with HTTP {}",
                base_url,
                response.status()
            )));
        }

        info!(uri = %base_url, "connected to remote vector database");
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "POST");
        let response = self.http.post(&url).json(body).send()?;
        let status = response.status();
        let text = response.text()?;

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            VectorDbError::backend(format!("unexpected response from {} (HTTP {}): {}", url, status, e))
        })?;
        envelope.into_result()
    }

    fn named(name: &str) -> CollectionNameRequest {
        CollectionNameRequest {
            collection_name: name.to_string(),
        }
    }
}

impl VectorBackend for RemoteBackend {
    fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<CollectionInfo> {
        self.post(
            "/v2/vectordb/collections/create",
            &CreateCollectionRequest {
                collection_name: name.to_string(),
                schema: schema.clone(),
            },
        )
    }

    fn drop_collection(&self, name: &str) -> Result<bool> {
        let response: DropResponse =
            self.post("/v2/vectordb/collections/drop", &Self::named(name))?;
        Ok(response.dropped)
    }

    fn has_collection(&self, name: &str) -> Result<bool> {
        let response: HasResponse = self.post("/v2/vectordb/collections/has", &Self::named(name))?;
        Ok(response.has)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        self.post("/v2/vectordb/collections/list", &serde_json::json!({}))
    }

    fn describe_collection(&self, name: &str) -> Result<CollectionInfo> {
        self.post("/v2/vectordb/collections/describe", &Self::named(name))
    }

    fn insert(&self, collection: &str, entities: Vec<Entity>) -> Result<InsertResult> {
        self.post(
            "/v2/vectordb/entities/insert",
            &InsertRequest {
                collection_name: collection.to_string(),
                data: entities,
            },
        )
    }

    fn delete_by_ids(&self, collection: &str, ids: &[i64]) -> Result<usize> {
        let response: DeleteResponse = self.post(
            "/v2/vectordb/entities/delete",
            &DeleteRequest {
                collection_name: collection.to_string(),
                ids: Some(ids.to_vec()),
                filter: None,
            },
        )?;
        Ok(response.delete_count)
    }

    fn delete_by_filter(&self, collection: &str, filter: &str) -> Result<usize> {
        let response: DeleteResponse = self.post(
            "/v2/vectordb/entities/delete",
            &DeleteRequest {
                collection_name: collection.to_string(),
                ids: None,
                filter: Some(filter.to_string()),
            },
        )?;
        Ok(response.delete_count)
    }

    fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<Vec<Hit>>> {
        self.post(
            "/v2/vectordb/entities/search",
            &SearchBody {
                collection_name: collection.to_string(),
                request: request.clone(),
            },
        )
    }

    fn query_by_filter(
        &self,
        collection: &str,
        filter: &str,
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        self.post(
            "/v2/vectordb/entities/query",
            &QueryRequest {
                collection_name: collection.to_string(),
                filter: filter.to_string(),
                output_fields: output_fields.to_vec(),
            },
        )
    }

    fn query_by_ids(
        &self,
        collection: &str,
        ids: &[i64],
        output_fields: &[String],
    ) -> Result<Vec<Row>> {
        self.post(
            "/v2/vectordb/entities/get",
            &GetRequest {
                collection_name: collection.to_string(),
                id: ids.to_vec(),
                output_fields: output_fields.to_vec(),
            },
        )
    }

    fn flush(&self) -> Result<()> {
        let _: serde_json::Value =
            self.post("/v2/vectordb/collections/flush", &serde_json::json!({}))?;
        Ok(())
    }
}
