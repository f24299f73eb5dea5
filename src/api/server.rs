//! HTTP server lifecycle — bind, spawn, graceful shutdown.
//!
//! Pattern: bind → spawn background task → return a handle carrying a
//! shutdown channel.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Signal the server to stop accepting connections and wait for it
    /// to drain.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
        let _ = self.handle.await;
    }
}

/// Bind and serve the API in a background task.
pub async fn start(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Cannot bind {addr}: {e}"))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Cannot read local address: {e}"))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let router = api_router(ctx);

    let handle = tokio::spawn(async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = serve.await {
            tracing::error!("API server error: {e}");
        }
    });

    tracing::info!("API server listening on http://{local_addr}");
    Ok(ApiServer {
        addr: local_addr,
        shutdown_tx: Some(shutdown_tx),
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[tokio::test]
    async fn starts_on_ephemeral_port_and_shuts_down() {
        let ctx = ApiContext::new(open_memory_database().unwrap());
        let server = start(ctx, "127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(server.addr.port(), 0);
        server.shutdown().await;
    }
}
