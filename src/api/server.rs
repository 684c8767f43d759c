//! HTTP server for the checkpoint endpoints

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{
    cancel_checkpoint, checkpoint_status, handle_checkpoint, health_check, ApiState,
};
use crate::checkpoint::CheckpointCoordinator;

/// API server exposing the coordinator over HTTP
pub struct CheckpointApiServer {
    coordinator: Arc<CheckpointCoordinator>,
    addr: SocketAddr,
}

impl CheckpointApiServer {
    pub fn new(coordinator: Arc<CheckpointCoordinator>, addr: SocketAddr) -> Self {
        Self { coordinator, addr }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Starting checkpoint API server on {}", listener.local_addr()?);

        serve(listener, self.coordinator, shutdown).await
    }
}

/// Serve the API on an already bound listener
pub async fn serve<F>(
    listener: TcpListener,
    coordinator: Arc<CheckpointCoordinator>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(coordinator))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Checkpoint API server stopped");
    Ok(())
}

/// Build the API router
pub fn build_router(coordinator: Arc<CheckpointCoordinator>) -> Router {
    let state = Arc::new(ApiState { coordinator });

    Router::new()
        .route("/healthz", get(health_check))
        .route(
            "/checkpoint/{pod_uid}",
            post(handle_checkpoint)
                .get(checkpoint_status)
                .delete(cancel_checkpoint),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
