//! Walkthrough tests against a durable local database

use std::sync::Arc;
use tempfile::TempDir;
use vectordb_walkthrough::backend::local::LocalConfig;
use vectordb_walkthrough::demo::{self, DemoOptions, BIOLOGY_DOCS, HISTORY_DOCS};
use vectordb_walkthrough::{
    ClientConfig, ConnectionConfig, DropPolicy, Embedder, EmbeddingMode, LocalBackend,
    VectorClient,
};

#[test]
fn test_walkthrough_on_local_database() {
    let dir = TempDir::new().unwrap();
    let config = ClientConfig {
        connection: ConnectionConfig::from_uri(dir.path().join("milvus_demo.db").to_str().unwrap()),
        drop_policy: DropPolicy::Lenient,
    };
    let client = VectorClient::connect(&config).unwrap();
    let embedder = Embedder::fallback(768, Some(2024));
    let mut out = Vec::new();

    let report = demo::run(&client, &embedder, &DemoOptions::default(), &mut out).unwrap();

    assert_eq!(report.collection, "demo_collection");
    assert_eq!(report.embedding_mode, EmbeddingMode::Fallback);
    assert_eq!(report.vector_search.len(), 1);
    assert!(report.vector_search[0].len() <= 2);
    assert_eq!(report.filtered_search[0].len(), 2);

    let texts: Vec<&str> = report
        .history_rows
        .iter()
        .filter_map(|row| row.text("text"))
        .collect();
    assert_eq!(texts, HISTORY_DOCS.to_vec());

    for hit in &report.filtered_search[0] {
        assert!(BIOLOGY_DOCS.contains(&hit.entity.text("text").unwrap()));
    }

    let output = String::from_utf8(out).unwrap();
    let steps: Vec<String> = output
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["step"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        steps,
        vec![
            "create_collection",
            "insert_history",
            "vector_search",
            "insert_biology",
            "filtered_search",
            "query_by_filter",
            "query_by_ids",
            "delete_by_ids",
            "delete_by_filter",
            "drop_collection",
        ]
    );

    client.close().unwrap();

    // The dropped collection stays dropped after reopening
    let reopened = LocalBackend::open(dir.path().join("milvus_demo.db"), LocalConfig::default()).unwrap();
    let client = VectorClient::with_backend(Arc::new(reopened), DropPolicy::Lenient);
    assert!(client.collections().list().unwrap().is_empty());
}

#[test]
fn test_keep_existing_fails_fast() {
    let client = VectorClient::with_backend(Arc::new(LocalBackend::in_memory()), DropPolicy::Lenient);
    let embedder = Embedder::fallback(8, Some(1));
    client
        .collections()
        .create("demo_collection", &demo::demo_schema(4))
        .unwrap();

    let options = DemoOptions {
        reset: false,
        ..DemoOptions::default()
    };
    let mut out = Vec::new();
    // Existing 4-d collection conflicts with the 8-d schema
    assert!(demo::run(&client, &embedder, &options, &mut out).is_err());
    assert!(out.is_empty());
}
