//! The end-to-end walkthrough: create a collection, embed and insert
//! documents, search, filter, query, delete and drop.
//!
//! Each step writes one JSON line to the given writer. The first failing
//! step aborts the run.

use crate::backend::SearchRequest;
use crate::client::VectorClient;
use crate::embedding::{Embedder, EmbeddingMode, Embeddings};
use crate::entity::{Entity, Hit, Row};
use crate::error::Result;
use crate::schema::{CollectionSchema, FieldSchema};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use tracing::info;

pub const HISTORY_DOCS: [&str; 3] = [
    "Artificial intelligence was founded as an academic discipline in 1956.",
    "Alan Turing was the first person to conduct substantial research in AI.",
    "Born in Maida Vale, London, Turing was raised in southern England.",
];

pub const BIOLOGY_DOCS: [&str; 3] = [
    "Machine learning has been used for drug design.",
    "Computational synthesis with AI algorithms predicts molecular properties.",
    "DDR1 is involved in cancers and fibrosis.",
];

pub const AI_QUERY: &str = "tell me AI related information";

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub collection: String,
    /// Drop a leftover collection of the same name before starting.
    pub reset: bool,
    pub search_limit: usize,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            collection: "demo_collection".to_string(),
            reset: true,
            search_limit: 2,
        }
    }
}

/// Everything the walkthrough observed.
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub collection: String,
    /// `Fallback` if any encode call was answered by the random generator.
    pub embedding_mode: EmbeddingMode,
    pub inserted_ids: Vec<i64>,
    pub vector_search: Vec<Vec<Hit>>,
    pub filtered_search: Vec<Vec<Hit>>,
    pub history_rows: Vec<Row>,
    pub rows_by_id: Vec<Row>,
    pub deleted_by_ids: usize,
    pub deleted_by_filter: usize,
    pub dropped: bool,
}

/// Build the walkthrough schema for vectors of `dim` dimensions.
pub fn demo_schema(dim: usize) -> CollectionSchema {
    CollectionSchema::new(
        vec![
            FieldSchema::primary("id", false),
            FieldSchema::vector("vector", dim),
        ],
        "Demo collection for vector search",
    )
}

fn emit<W: Write>(out: &mut W, step: &str, value: serde_json::Value) -> Result<()> {
    let line = json!({ "step": step, "result": value });
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

fn documents(embeddings: &Embeddings, first_id: i64, texts: &[&str], subject: &str) -> Vec<Entity> {
    embeddings
        .vectors
        .iter()
        .zip(texts)
        .enumerate()
        .map(|(i, (vector, text))| {
            Entity::new(first_id + i as i64, vector.clone())
                .with_field("text", *text)
                .with_field("subject", subject)
        })
        .collect()
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run the walkthrough against `client`, encoding text with `embedder`.
pub fn run<W: Write>(
    client: &VectorClient,
    embedder: &Embedder,
    options: &DemoOptions,
    out: &mut W,
) -> Result<DemoReport> {
    let name = options.collection.as_str();
    let collections = client.collections();
    let records = client.records();
    let queries = client.queries();
    let text_fields = ["text", "subject"];
    let mut mode = embedder.mode();
    let mut track = |embeddings: &Embeddings| {
        if embeddings.mode == EmbeddingMode::Fallback {
            mode = EmbeddingMode::Fallback;
        }
    };

    info!(collection = name, mode = ?embedder.mode(), "starting walkthrough");

    if options.reset && collections.has(name)? {
        collections.drop(name)?;
        emit(out, "reset", json!({ "dropped": name }))?;
    }

    let info = collections.create(name, &demo_schema(embedder.dimension()))?;
    emit(
        out,
        "create_collection",
        json!({ "collection": info.name, "dimension": embedder.dimension(), "embedding_mode": embedder.mode() }),
    )?;

    // History documents and a search with the first of their vectors
    let history = embedder.encode_documents(&HISTORY_DOCS);
    track(&history);
    let inserted = records.insert(name, documents(&history, 0, &HISTORY_DOCS, "history"))?;
    emit(out, "insert_history", to_value(&inserted)?)?;
    let mut inserted_ids = inserted.insert_ids;

    let first = history.vectors[..1].to_vec();
    let vector_search = queries.search(
        name,
        &SearchRequest::new(first, options.search_limit).output_fields(text_fields),
    )?;
    emit(out, "vector_search", to_value(&vector_search)?)?;

    // Biology documents and a filtered search
    let biology = embedder.encode_documents(&BIOLOGY_DOCS);
    track(&biology);
    let inserted = records.insert(name, documents(&biology, 3, &BIOLOGY_DOCS, "biology"))?;
    emit(out, "insert_biology", to_value(&inserted)?)?;
    inserted_ids.extend(inserted.insert_ids);

    let query = embedder.encode_queries(&[AI_QUERY]);
    track(&query);
    let filtered_search = queries.search(
        name,
        &SearchRequest::new(query.vectors, options.search_limit)
            .output_fields(text_fields)
            .filter("subject == 'biology'"),
    )?;
    emit(out, "filtered_search", to_value(&filtered_search)?)?;

    let text_fields: Vec<String> = text_fields.iter().map(|f| f.to_string()).collect();
    let history_rows = queries.query_by_filter(name, "subject == 'history'", &text_fields)?;
    emit(out, "query_by_filter", to_value(&history_rows)?)?;

    let with_vector: Vec<String> = ["vector", "text", "subject"]
        .iter()
        .map(|f| f.to_string())
        .collect();
    let rows_by_id = queries.query_by_ids(name, &[0, 2], &with_vector)?;
    emit(out, "query_by_ids", to_value(&rows_by_id)?)?;

    let deleted_by_ids = records.delete_by_ids(name, &[0, 2])?;
    emit(out, "delete_by_ids", json!({ "deleteCount": deleted_by_ids }))?;

    let deleted_by_filter = records.delete_by_filter(name, "subject == 'biology'")?;
    emit(out, "delete_by_filter", json!({ "deleteCount": deleted_by_filter }))?;

    let dropped = collections.drop(name)?;
    emit(out, "drop_collection", json!({ "dropped": dropped }))?;

    info!(collection = name, mode = ?mode, "walkthrough finished");
    Ok(DemoReport {
        collection: name.to_string(),
        embedding_mode: mode,
        inserted_ids,
        vector_search,
        filtered_search,
        history_rows,
        rows_by_id,
        deleted_by_ids,
        deleted_by_filter,
        dropped,
    })
}
