//! HTTP route handlers for the vector database API.

use crate::backend::InsertResult;
use crate::entity::{Hit, Row};
use crate::error::{Result, VectorDbError};
use crate::schema::CollectionInfo;
use crate::server::AppState;
use crate::wire::{
    CollectionNameRequest, CreateCollectionRequest, DeleteRequest, DeleteResponse, DropResponse,
    Envelope, GetRequest, HasResponse, InsertRequest, QueryRequest, SearchBody,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub collections: usize,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_searches: u64,
    pub total_queries: u64,
    pub rows_inserted: u64,
    pub rows_deleted: u64,
    pub errors: u64,
    pub avg_search_latency_us: f64,
    pub p50_search_latency_us: f64,
    pub p95_search_latency_us: f64,
    pub p99_search_latency_us: f64,
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v2/vectordb/collections/create", post(create_collection))
        .route("/v2/vectordb/collections/drop", post(drop_collection))
        .route("/v2/vectordb/collections/has", post(has_collection))
        .route("/v2/vectordb/collections/list", post(list_collections))
        .route("/v2/vectordb/collections/describe", post(describe_collection))
        .route("/v2/vectordb/collections/flush", post(flush))
        .route("/v2/vectordb/entities/insert", post(insert))
        .route("/v2/vectordb/entities/delete", post(delete))
        .route("/v2/vectordb/entities/search", post(search))
        .route("/v2/vectordb/entities/query", post(query))
        .route("/v2/vectordb/entities/get", post(get_entities))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

/// Wrap a backend result in the envelope, counting failures.
fn respond<T>(state: &AppState, route: &str, result: Result<T>) -> Json<Envelope<T>> {
    if let Err(e) = &result {
        warn!(route, code = e.code(), error = %e, "request failed");
        if let Ok(mut metrics) = state.metrics.write() {
            metrics.record_error();
        }
    }
    Json(Envelope::from_result(result))
}

// --- Handlers ---

async fn create_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCollectionRequest>,
) -> Json<Envelope<CollectionInfo>> {
    let result = state
        .backend
        .create_collection(&req.collection_name, &req.schema);
    respond(&state, "collections/create", result)
}

async fn drop_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionNameRequest>,
) -> Json<Envelope<DropResponse>> {
    let result = state
        .backend
        .drop_collection(&req.collection_name)
        .map(|dropped| DropResponse { dropped });
    respond(&state, "collections/drop", result)
}

async fn has_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionNameRequest>,
) -> Json<Envelope<HasResponse>> {
    let result = state
        .backend
        .has_collection(&req.collection_name)
        .map(|has| HasResponse { has });
    respond(&state, "collections/has", result)
}

async fn list_collections(State(state): State<Arc<AppState>>) -> Json<Envelope<Vec<String>>> {
    let result = state.backend.list_collections();
    respond(&state, "collections/list", result)
}

async fn describe_collection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CollectionNameRequest>,
) -> Json<Envelope<CollectionInfo>> {
    let result = state.backend.describe_collection(&req.collection_name);
    respond(&state, "collections/describe", result)
}

async fn flush(State(state): State<Arc<AppState>>) -> Json<Envelope<serde_json::Value>> {
    let result = state.backend.flush().map(|()| serde_json::json!({}));
    respond(&state, "collections/flush", result)
}

async fn insert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InsertRequest>,
) -> Json<Envelope<InsertResult>> {
    let result = state.backend.insert(&req.collection_name, req.data);

    if let Ok(inserted) = &result {
        if let Ok(mut metrics) = state.metrics.write() {
            metrics.record_insert(inserted.insert_count);
        }
    }

    respond(&state, "entities/insert", result)
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> Json<Envelope<DeleteResponse>> {
    let result = match (&req.ids, &req.filter) {
        (Some(ids), None) => state.backend.delete_by_ids(&req.collection_name, ids),
        (None, Some(filter)) => state.backend.delete_by_filter(&req.collection_name, filter),
        _ => Err(VectorDbError::backend(
            "delete needs exactly one of `ids` or `filter`",
        )),
    };

    if let Ok(count) = &result {
        if let Ok(mut metrics) = state.metrics.write() {
            metrics.record_delete(*count);
        }
    }

    let result = result.map(|delete_count| DeleteResponse { delete_count });
    respond(&state, "entities/delete", result)
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchBody>,
) -> Json<Envelope<Vec<Vec<Hit>>>> {
    let start = Instant::now();
    let result = state.backend.search(&req.collection_name, &req.request);
    let elapsed = start.elapsed();

    if result.is_ok() {
        if let Ok(mut metrics) = state.metrics.write() {
            metrics.record_search(elapsed);
        }
    }

    respond(&state, "entities/search", result)
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Json<Envelope<Vec<Row>>> {
    let result = state
        .backend
        .query_by_filter(&req.collection_name, &req.filter, &req.output_fields);
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query();
    }
    respond(&state, "entities/query", result)
}

async fn get_entities(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetRequest>,
) -> Json<Envelope<Vec<Row>>> {
    let result = state
        .backend
        .query_by_ids(&req.collection_name, &req.id, &req.output_fields);
    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query();
    }
    respond(&state, "entities/get", result)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let collections = state
        .backend
        .list_collections()
        .map(|names| names.len())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        collections,
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let metrics = match state.metrics.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    Json(MetricsResponse {
        total_searches: metrics.total_searches(),
        total_queries: metrics.total_queries(),
        rows_inserted: metrics.rows_inserted(),
        rows_deleted: metrics.rows_deleted(),
        errors: metrics.errors(),
        avg_search_latency_us: metrics.avg_search_latency_us(),
        p50_search_latency_us: metrics.percentile_search_latency_us(50.0),
        p95_search_latency_us: metrics.percentile_search_latency_us(95.0),
        p99_search_latency_us: metrics.percentile_search_latency_us(99.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::metrics::MetricsCollector;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::RwLock;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(Arc::new(AppState {
            backend: Arc::new(LocalBackend::in_memory()),
            metrics: RwLock::new(MetricsCollector::new()),
        }))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> serde_json::Value {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn schema_json() -> serde_json::Value {
        serde_json::to_value(crate::schema::CollectionSchema::new(
            vec![
                crate::schema::FieldSchema::primary("id", false),
                crate::schema::FieldSchema::vector("vector", 2),
            ],
            "",
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_collection_lifecycle_over_http() {
        let app = app();
        let created = call(
            &app,
            "POST",
            "/v2/vectordb/collections/create",
            serde_json::json!({ "collectionName": "docs", "schema": schema_json() }),
        )
        .await;
        assert_eq!(created["code"], 0);
        assert_eq!(created["data"]["row_count"], 0);

        let has = call(
            &app,
            "POST",
            "/v2/vectordb/collections/has",
            serde_json::json!({ "collectionName": "docs" }),
        )
        .await;
        assert_eq!(has["data"]["has"], true);

        let dropped = call(
            &app,
            "POST",
            "/v2/vectordb/collections/drop",
            serde_json::json!({ "collectionName": "docs" }),
        )
        .await;
        assert_eq!(dropped["data"]["dropped"], true);

        let health = call(&app, "GET", "/health", serde_json::Value::Null).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["collections"], 0);
    }

    #[tokio::test]
    async fn test_errors_use_envelope_codes() {
        let app = app();
        let missing = call(
            &app,
            "POST",
            "/v2/vectordb/collections/describe",
            serde_json::json!({ "collectionName": "nope" }),
        )
        .await;
        assert_eq!(missing["code"], 100);
        assert!(missing.get("data").is_none());

        call(
            &app,
            "POST",
            "/v2/vectordb/collections/create",
            serde_json::json!({ "collectionName": "docs", "schema": schema_json() }),
        )
        .await;
        let wrong_dim = call(
            &app,
            "POST",
            "/v2/vectordb/entities/insert",
            serde_json::json!({
                "collectionName": "docs",
                "data": [{ "id": 1, "vector": [1.0, 2.0, 3.0] }]
            }),
        )
        .await;
        assert_eq!(wrong_dim["code"], 1102);
        assert_eq!(wrong_dim["detail"]["expected"], 2);

        let both = call(
            &app,
            "POST",
            "/v2/vectordb/entities/delete",
            serde_json::json!({ "collectionName": "docs", "ids": [1], "filter": "id > 0" }),
        )
        .await;
        assert_eq!(both["code"], 1);

        let metrics = call(&app, "GET", "/metrics", serde_json::Value::Null).await;
        assert_eq!(metrics["errors"], 3);
    }

    #[tokio::test]
    async fn test_search_records_metrics() {
        let app = app();
        call(
            &app,
            "POST",
            "/v2/vectordb/collections/create",
            serde_json::json!({ "collectionName": "docs", "schema": schema_json() }),
        )
        .await;
        let inserted = call(
            &app,
            "POST",
            "/v2/vectordb/entities/insert",
            serde_json::json!({
                "collectionName": "docs",
                "data": [
                    { "id": 1, "vector": [1.0, 0.0], "fields": { "subject": "history" } },
                    { "id": 2, "vector": [0.0, 1.0], "fields": { "subject": "biology" } }
                ]
            }),
        )
        .await;
        assert_eq!(inserted["data"]["insertCount"], 2);

        let hits = call(
            &app,
            "POST",
            "/v2/vectordb/entities/search",
            serde_json::json!({
                "collectionName": "docs",
                "data": [[1.0, 0.1]],
                "limit": 5,
                "outputFields": ["subject"],
                "filter": "subject == 'biology'"
            }),
        )
        .await;
        assert_eq!(hits["code"], 0);
        assert_eq!(hits["data"][0].as_array().unwrap().len(), 1);
        assert_eq!(hits["data"][0][0]["entity"]["id"], 2);
        assert_eq!(hits["data"][0][0]["entity"]["fields"]["subject"], "biology");

        let metrics = call(&app, "GET", "/metrics", serde_json::Value::Null).await;
        assert_eq!(metrics["total_searches"], 1);
        assert_eq!(metrics["rows_inserted"], 2);
    }
}
