//! Embedding selection tests against a stand-in embeddings endpoint

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vectordb_walkthrough::embedding::{EmbeddingProvider, RealEmbedding};
use vectordb_walkthrough::{Embedder, EmbeddingConfig, EmbeddingMode, VectorDbError};

const DIM: usize = 8;

#[derive(Deserialize)]
struct EmbedBody {
    inputs: Vec<String>,
}

struct Endpoint {
    healthy: AtomicBool,
    dim: usize,
}

/// Deterministic vector derived from the text's bytes.
fn fake_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for (i, b) in text.bytes().enumerate() {
        v[i % dim] += b as f32 / 255.0;
    }
    v
}

async fn embed(
    State(endpoint): State<Arc<Endpoint>>,
    Json(body): Json<EmbedBody>,
) -> Result<Json<Vec<Vec<f32>>>, StatusCode> {
    if !endpoint.healthy.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(
        body.inputs
            .iter()
            .map(|t| fake_embedding(t, endpoint.dim))
            .collect(),
    ))
}

/// Serve the stand-in endpoint on a background thread for the rest of the test.
fn spawn_endpoint(dim: usize) -> (SocketAddr, Arc<Endpoint>) {
    let endpoint = Arc::new(Endpoint {
        healthy: AtomicBool::new(true),
        dim,
    });
    let app = Router::new()
        .route("/embed", post(embed))
        .with_state(endpoint.clone());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    (addr, endpoint)
}

fn config(endpoint: Option<String>, dim: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        endpoint,
        dimension: dim,
        timeout: Duration::from_secs(2),
        query_prefix: None,
        seed: Some(5),
    }
}

#[test]
fn test_unreachable_endpoint_selects_fallback() {
    let embedder = Embedder::select(&config(Some("http://127.0.0.1:9".to_string()), 768));
    assert_eq!(embedder.mode(), EmbeddingMode::Fallback);

    let out = embedder.encode_documents(&["a", "b"]);
    assert_eq!(out.mode, EmbeddingMode::Fallback);
    assert_eq!(out.vectors.len(), 2);
    assert!(out.vectors.iter().all(|v| v.dimension() == 768));
}

#[test]
fn test_reachable_endpoint_selects_real() {
    let (addr, _endpoint) = spawn_endpoint(DIM);
    let embedder = Embedder::select(&config(Some(format!("http://{}", addr)), DIM));
    assert_eq!(embedder.mode(), EmbeddingMode::Real);

    let out = embedder.encode_documents(&["Alan Turing", "DDR1"]);
    assert_eq!(out.mode, EmbeddingMode::Real);
    assert_eq!(out.vectors[0].as_slice(), fake_embedding("Alan Turing", DIM).as_slice());
}

#[test]
fn test_wrong_dimension_is_unavailable() {
    let (addr, _endpoint) = spawn_endpoint(DIM);
    let err = RealEmbedding::connect(&format!("http://{}", addr), 16, Duration::from_secs(2))
        .unwrap_err();
    assert!(matches!(err, VectorDbError::EmbeddingUnavailable { .. }));

    let embedder = Embedder::select(&config(Some(format!("http://{}", addr)), 16));
    assert_eq!(embedder.mode(), EmbeddingMode::Fallback);
    assert_eq!(embedder.dimension(), 16);
}

#[test]
fn test_failure_after_selection_switches_to_fallback() {
    let (addr, endpoint) = spawn_endpoint(DIM);
    let real = RealEmbedding::connect(&format!("http://{}", addr), DIM, Duration::from_secs(2))
        .unwrap();
    let embedder = Embedder::real(real, Some(1));

    endpoint.healthy.store(false, Ordering::SeqCst);
    let out = embedder.encode_queries(&["tell me AI related information"]);
    assert_eq!(out.mode, EmbeddingMode::Fallback);
    assert_eq!(out.vectors[0].dimension(), DIM);

    assert_eq!(embedder.mode(), EmbeddingMode::Fallback);

    // Recovery of the endpoint does not switch back mid-run
    endpoint.healthy.store(true, Ordering::SeqCst);
    assert_eq!(embedder.encode_queries(&["x"]).mode, EmbeddingMode::Fallback);
    assert_eq!(embedder.encode_documents(&["y"]).mode, EmbeddingMode::Fallback);
}

#[test]
fn test_query_prefix_is_applied() {
    let (addr, _endpoint) = spawn_endpoint(DIM);
    let real = RealEmbedding::connect(&format!("http://{}", addr), DIM, Duration::from_secs(2))
        .unwrap()
        .with_query_prefix("query: ");

    let queries = real.encode_queries(&["AI"]).unwrap();
    let documents = real.encode(&["query: AI"]).unwrap();
    assert_eq!(queries, documents);
    assert_eq!(real.mode(), EmbeddingMode::Real);
}
