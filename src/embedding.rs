//! Text embedding: a real HTTP embedding service, a random fallback, and the
//! `Embedder` that picks one at startup.
//!
//! Fallback vectors carry no similarity signal. Every result reports the
//! [`EmbeddingMode`] that produced it so callers can tell the two apart.

use crate::config::EmbeddingConfig;
use crate::error::{Result, VectorDbError};
use crate::vector::Vector;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which generator produced a set of vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Real,
    Fallback,
}

/// Turns text into fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    fn mode(&self) -> EmbeddingMode;

    /// One vector per input text, in input order.
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vector>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// Client for a text-embeddings endpoint: `POST {url}/embed` with
/// `{"inputs": [..]}` answering `[[f32, ..], ..]`.
#[derive(Debug)]
pub struct RealEmbedding {
    url: String,
    dim: usize,
    http: Client,
    query_prefix: Option<String>,
}

impl RealEmbedding {
    /// Connect and probe the endpoint. Fails with `EmbeddingUnavailable`
    /// when it cannot be reached or returns vectors of another dimension.
    pub fn connect(endpoint: &str, dim: usize, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(unavailable)?;
        let embedding = Self {
            url: format!("{}/embed", endpoint.trim_end_matches('/')),
            dim,
            http,
            query_prefix: None,
        };

        embedding.request(&["probe".to_string()])?;
        info!(url = %embedding.url, dim, "embedding endpoint ready");
        Ok(embedding)
    }

    pub fn with_query_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.query_prefix = Some(prefix.into());
        self
    }

    /// Encode texts as search queries, applying the query prefix if set.
    pub fn encode_queries(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let prefix = self.query_prefix.as_deref().unwrap_or("");
        let inputs: Vec<String> = texts.iter().map(|t| format!("{}{}", prefix, t)).collect();
        self.request(&inputs)
    }

    fn request(&self, inputs: &[String]) -> Result<Vec<Vector>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(&self.url)
            .json(&EmbedRequest { inputs })
            .send()
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(VectorDbError::EmbeddingUnavailable {
                reason: format!("{} answered HTTP {}", self.url, response.status()),
            });
        }
        let rows: Vec<Vec<f32>> = response.json().map_err(unavailable)?;

        if rows.len() != inputs.len() {
            return Err(VectorDbError::EmbeddingUnavailable {
                reason: format!("expected {} embeddings, got {}", inputs.len(), rows.len()),
            });
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != self.dim) {
            return Err(VectorDbError::EmbeddingUnavailable {
                reason: format!(
                    "endpoint produces {}-dimensional vectors, expected {}",
                    bad.len(),
                    self.dim
                ),
            });
        }

        Ok(rows.into_iter().map(Vector::new).collect())
    }
}

fn unavailable(e: reqwest::Error) -> VectorDbError {
    VectorDbError::EmbeddingUnavailable {
        reason: e.to_string(),
    }
}

impl EmbeddingProvider for RealEmbedding {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn mode(&self) -> EmbeddingMode {
        EmbeddingMode::Real
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let inputs: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        self.request(&inputs)
    }
}

/// Uniform random vectors over [-1, 1).
#[derive(Debug)]
pub struct FallbackEmbedding {
    dim: usize,
    rng: Mutex<StdRng>,
}

impl FallbackEmbedding {
    pub fn new(dim: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            dim,
            rng: Mutex::new(rng),
        }
    }

    /// Infallible form of `encode`.
    pub fn generate(&self, count: usize) -> Vec<Vector> {
        let range = Uniform::new(-1.0f32, 1.0f32);
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..count)
            .map(|_| Vector::new((0..self.dim).map(|_| range.sample(&mut *rng)).collect()))
            .collect()
    }
}

impl EmbeddingProvider for FallbackEmbedding {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn mode(&self) -> EmbeddingMode {
        EmbeddingMode::Fallback
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        Ok(self.generate(texts.len()))
    }
}

/// Vectors plus the mode that produced them.
#[derive(Debug, Clone)]
pub struct Embeddings {
    pub vectors: Vec<Vector>,
    pub mode: EmbeddingMode,
}

/// Embedding strategy chosen once and injected where text is encoded.
#[derive(Debug)]
pub enum Embedder {
    /// The real endpoint, with a fallback generator of the same dimension.
    /// The first failed call switches to the fallback for good, so one
    /// embedder never mixes real and random vectors after that point.
    Real {
        real: RealEmbedding,
        fallback: FallbackEmbedding,
        degraded: AtomicBool,
    },
    Fallback(FallbackEmbedding),
}

impl Embedder {
    /// Probe the configured endpoint and fall back to random vectors if it
    /// is missing or unusable.
    pub fn select(config: &EmbeddingConfig) -> Self {
        let Some(endpoint) = config.endpoint.as_deref() else {
            warn!(
                dim = config.dimension,
                "no embedding endpoint configured, using random fallback vectors"
            );
            return Self::fallback(config.dimension, config.seed);
        };

        match RealEmbedding::connect(endpoint, config.dimension, config.timeout) {
            Ok(real) => {
                let real = match &config.query_prefix {
                    Some(prefix) => real.with_query_prefix(prefix.clone()),
                    None => real,
                };
                Self::real(real, config.seed)
            }
            Err(e) => {
                warn!(
                    endpoint,
                    error = %e,
                    "embedding endpoint unavailable, using random fallback vectors"
                );
                Self::fallback(config.dimension, config.seed)
            }
        }
    }

    pub fn real(real: RealEmbedding, seed: Option<u64>) -> Self {
        let fallback = FallbackEmbedding::new(real.dimension(), seed);
        Self::Real {
            real,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn fallback(dim: usize, seed: Option<u64>) -> Self {
        Self::Fallback(FallbackEmbedding::new(dim, seed))
    }

    pub fn mode(&self) -> EmbeddingMode {
        match self {
            Self::Real { degraded, .. } if !degraded.load(Ordering::Acquire) => {
                EmbeddingMode::Real
            }
            Self::Real { .. } | Self::Fallback(_) => EmbeddingMode::Fallback,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Real { real, .. } => real.dimension(),
            Self::Fallback(fallback) => fallback.dimension(),
        }
    }

    /// Encode documents for insertion.
    pub fn encode_documents(&self, texts: &[&str]) -> Embeddings {
        self.encode_with(texts, |real| real.encode(texts))
    }

    /// Encode search queries.
    pub fn encode_queries(&self, texts: &[&str]) -> Embeddings {
        self.encode_with(texts, |real| real.encode_queries(texts))
    }

    fn encode_with<F>(&self, texts: &[&str], call: F) -> Embeddings
    where
        F: FnOnce(&RealEmbedding) -> Result<Vec<Vector>>,
    {
        let fallback = match self {
            Self::Real {
                fallback, degraded, ..
            } if degraded.load(Ordering::Acquire) => fallback,
            Self::Real {
                real,
                fallback,
                degraded,
            } => match call(real) {
                Ok(vectors) => {
                    debug!(count = vectors.len(), "encoded with embedding endpoint");
                    return Embeddings {
                        vectors,
                        mode: EmbeddingMode::Real,
                    };
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        count = texts.len(),
                        "embedding call failed, switching to fallback vectors"
                    );
                    degraded.store(true, Ordering::Release);
                    fallback
                }
            },
            Self::Fallback(fallback) => fallback,
        };

        Embeddings {
            vectors: fallback.generate(texts.len()),
            mode: EmbeddingMode::Fallback,
        }
    }
}

impl EmbeddingProvider for Embedder {
    fn dimension(&self) -> usize {
        Embedder::dimension(self)
    }

    fn mode(&self) -> EmbeddingMode {
        Embedder::mode(self)
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        Ok(self.encode_documents(texts).vectors)
    }
}
