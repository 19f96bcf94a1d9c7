//! CLI for the vector database walkthrough

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vectordb_walkthrough::backend::local::LocalConfig;
use vectordb_walkthrough::demo::{self, DemoOptions};
use vectordb_walkthrough::{
    ClientConfig, ConnectionConfig, DropPolicy, Embedder, EmbeddingConfig, LocalBackend,
    VectorBackend, VectorClient,
};

#[derive(Parser)]
#[command(name = "vectordb-walkthrough")]
#[command(about = "Walk through collections, embeddings, search, query and delete against a vector database", long_about = None)]
struct Cli {
    /// Database location: a local directory, ":memory:", or http(s)://host:port
    #[arg(long, env = "VECTORDB_URI", default_value = "milvus_demo.db", global = true)]
    uri: String,

    /// Request timeout for a remote database, in seconds
    #[arg(long, env = "VECTORDB_TIMEOUT_SECS", default_value_t = 10, global = true)]
    timeout_secs: u64,

    /// Fail when dropping a collection that does not exist
    #[arg(long, global = true)]
    strict_drop: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the walkthrough (default)
    Demo(DemoArgs),
    /// List collections
    List,
    /// Serve a local database over HTTP
    Serve {
        /// Address to bind to
        #[arg(long, env = "VECTORDB_ADDR", default_value = "0.0.0.0:19530")]
        addr: String,
    },
}

#[derive(Parser)]
struct DemoArgs {
    /// Text embeddings endpoint; random vectors are used when unset or unreachable
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding dimension
    #[arg(long, env = "EMBEDDING_DIM", default_value_t = 768)]
    dim: usize,

    /// Prefix added to search queries before embedding
    #[arg(long, env = "EMBEDDING_QUERY_PREFIX")]
    query_prefix: Option<String>,

    /// Seed for fallback vectors
    #[arg(long)]
    seed: Option<u64>,

    /// Collection to create and drop
    #[arg(long, default_value = "demo_collection")]
    collection: String,

    /// Fail instead of dropping a leftover collection of the same name
    #[arg(long)]
    keep_existing: bool,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connection: ConnectionConfig::from_uri(&self.uri)
                .with_timeout(Duration::from_secs(self.timeout_secs)),
            drop_policy: if self.strict_drop {
                DropPolicy::Strict
            } else {
                DropPolicy::Lenient
            },
        }
    }
}

fn run_demo(config: &ClientConfig, args: DemoArgs) -> Result<()> {
    let embedder = Embedder::select(&EmbeddingConfig {
        endpoint: args.embedding_url,
        dimension: args.dim,
        query_prefix: args.query_prefix,
        seed: args.seed,
        ..EmbeddingConfig::default()
    });

    let client = VectorClient::connect(config).context("connecting to the vector database")?;
    let options = DemoOptions {
        collection: args.collection,
        reset: !args.keep_existing,
        ..DemoOptions::default()
    };

    let stdout = std::io::stdout();
    let report = demo::run(&client, &embedder, &options, &mut stdout.lock())
        .context("walkthrough failed")?;
    tracing::info!(
        mode = ?report.embedding_mode,
        inserted = report.inserted_ids.len(),
        "walkthrough complete"
    );

    client.close()?;
    Ok(())
}

fn list(config: &ClientConfig) -> Result<()> {
    let client = VectorClient::connect(config)?;
    let names = client.collections().list()?;
    if names.is_empty() {
        println!("No collections");
    } else {
        println!("Collections ({} total):", names.len());
        for name in names {
            let info = client.collections().describe(&name)?;
            println!("  - {} ({} rows)", name, info.row_count);
        }
    }
    client.close()?;
    Ok(())
}

fn serve(config: &ClientConfig, addr: &str) -> Result<()> {
    let backend = match &config.connection {
        ConnectionConfig::InMemory => LocalBackend::in_memory(),
        ConnectionConfig::Local {
            path,
            checkpoint_interval,
        } => LocalBackend::open(
            path,
            LocalConfig {
                checkpoint_interval: *checkpoint_interval,
            },
        )?,
        ConnectionConfig::Remote { uri, .. } => {
            bail!("cannot serve a remote database ({}); pass a local path or :memory:", uri)
        }
    };
    let backend = Arc::new(backend);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(vectordb_walkthrough::server::start(addr, backend.clone()))?;

    backend.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("vectordb_walkthrough=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();

    match cli.command {
        Some(Commands::Demo(args)) => run_demo(&config, args),
        None => run_demo(&config, DemoArgs::parse_from(["demo"])),
        Some(Commands::List) => list(&config),
        Some(Commands::Serve { addr }) => serve(&config, &addr),
    }
}
