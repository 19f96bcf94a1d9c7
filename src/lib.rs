//! # VectorDB Walkthrough
//!
//! A client for a vector database service, and the walkthrough that
//! exercises it end to end.
//!
//! This library provides:
//! - Collection schemas, entities and Milvus-style filter expressions
//! - A `VectorBackend` contract with an in-process implementation (optionally
//!   durable through a write-ahead log and snapshots) and an HTTP one
//! - A client object with collection, record and query components
//! - Real or fallback text embeddings
//! - An axum HTTP server exposing a local database
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vectordb_walkthrough::backend::{LocalBackend, SearchRequest};
//! use vectordb_walkthrough::config::DropPolicy;
//! use vectordb_walkthrough::schema::{CollectionSchema, FieldSchema};
//! use vectordb_walkthrough::{Entity, Vector, VectorClient};
//!
//! let client = VectorClient::with_backend(Arc::new(LocalBackend::in_memory()), DropPolicy::Lenient);
//! let schema = CollectionSchema::new(
//!     vec![FieldSchema::primary("id", false), FieldSchema::vector("vector", 3)],
//!     "docs",
//! );
//! client.collections().create("docs", &schema).unwrap();
//!
//! client
//!     .records()
//!     .insert("docs", vec![Entity::new(1, vec![1.0, 2.0, 3.0]).with_field("subject", "history")])
//!     .unwrap();
//!
//! let request = SearchRequest::new(vec![Vector::new(vec![1.1, 2.1, 3.1])], 5)
//!     .filter("subject == 'history'");
//! let hits = client.queries().search("docs", &request).unwrap();
//! assert_eq!(hits[0][0].id(), 1);
//! ```

pub mod backend;
pub mod client;
pub mod collection;
pub mod config;
pub mod demo;
pub mod distance;
pub mod embedding;
pub mod entity;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod persistence;
pub mod schema;
pub mod server;
pub mod vector;
pub mod wire;

pub use backend::{LocalBackend, RemoteBackend, SearchRequest, VectorBackend};
pub use client::VectorClient;
pub use config::{ClientConfig, ConnectionConfig, DropPolicy, EmbeddingConfig};
pub use distance::MetricType;
pub use embedding::{Embedder, EmbeddingMode};
pub use entity::{Entity, FieldValue, Hit, Row};
pub use error::{Result, VectorDbError};
pub use schema::{CollectionSchema, DataType, FieldSchema};
pub use vector::Vector;
