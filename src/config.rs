//! Connection, embedding and client configuration.
//!
//! Everything here is plain data with `Default` impls; the binary fills it
//! from command-line flags and environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Where the vector database lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionConfig {
    /// Process-local, nothing written to disk.
    InMemory,
    /// A durable local database directory.
    Local {
        path: PathBuf,
        checkpoint_interval: usize,
    },
    /// A service reachable over HTTP.
    Remote { uri: String, timeout: Duration },
}

impl ConnectionConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 1000;

    /// Interpret a connection string: `http(s)://...` is a remote service,
    /// `:memory:` an in-process store, anything else a local path.
    pub fn from_uri(uri: &str) -> Self {
        let uri = uri.trim();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            Self::Remote {
                uri: uri.to_string(),
                timeout: Self::DEFAULT_TIMEOUT,
            }
        } else if uri == ":memory:" || uri.is_empty() {
            Self::InMemory
        } else {
            Self::Local {
                path: PathBuf::from(uri),
                checkpoint_interval: Self::DEFAULT_CHECKPOINT_INTERVAL,
            }
        }
    }

    /// Override the request timeout of a remote connection.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Self::Remote { uri, .. } => Self::Remote { uri, timeout },
            other => other,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_uri("milvus_demo.db")
    }
}

/// What `drop` does when the collection is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Report `false` and carry on.
    #[default]
    Lenient,
    /// Fail with `NotFound`.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub drop_policy: DropPolicy,
}

/// Embedding endpoint and the shape of the vectors it must produce.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Base URL of a text-embeddings endpoint. `None` goes straight to the
    /// fallback generator.
    pub endpoint: Option<String>,
    pub dimension: usize,
    pub timeout: Duration,
    /// Prepended to texts passed to `encode_queries`.
    pub query_prefix: Option<String>,
    /// Seed for the fallback generator; unseeded draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            dimension: 768,
            timeout: Duration::from_secs(30),
            query_prefix: None,
            seed: None,
        }
    }
}
