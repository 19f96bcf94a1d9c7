//! HTTP API server for the vector database.

pub mod routes;

use crate::backend::VectorBackend;
use crate::metrics::MetricsCollector;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Shared application state for the HTTP server.
pub struct AppState {
    pub backend: Arc<dyn VectorBackend>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }
}

/// Serve `backend` on `addr` until Ctrl-C.
pub async fn start(addr: &str, backend: Arc<dyn VectorBackend>) -> anyhow::Result<()> {
    let app = routes::create_router(Arc::new(AppState::new(backend)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("server stopped");
    Ok(())
}

/// A server running on its own thread and runtime. Blocking clients can
/// talk to it from ordinary threads; dropping the handle stops it.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for `RemoteBackend::connect`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind `addr` (port 0 picks a free port) and serve `backend` in the background.
pub fn spawn(addr: &str, backend: Arc<dyn VectorBackend>) -> anyhow::Result<ServerHandle> {
    let listener = std::net::TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let (tx, rx) = oneshot::channel::<()>();
    let app = routes::create_router(Arc::new(AppState::new(backend)));

    let thread = std::thread::spawn(move || {
        runtime.block_on(async move {
            let listener = match tokio::net::TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, "failed to adopt listener");
                    return;
                }
            };
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "server stopped with an error");
            }
        });
    });

    info!(addr = %local_addr, "background server listening");
    Ok(ServerHandle {
        addr: local_addr,
        shutdown: Some(tx),
        thread: Some(thread),
    })
}
