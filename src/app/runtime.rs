//! Runtime initialization and setup
//!
//! Wires the workload registry, simulated runtime, checkpoint registry, and
//! coordinator from the daemon configuration and runs the API server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::abstractions::{InMemoryWorkloadRegistry, SimulatedBackend};
use crate::api::CheckpointApiServer;
use crate::checkpoint::{CheckpointCoordinator, CheckpointRegistry};
use crate::config::DaemonConfig;

/// Build a coordinator backed by the static workload table and the simulated runtime
pub fn build_coordinator(config: &DaemonConfig) -> Arc<CheckpointCoordinator> {
    let registry = Arc::new(
        CheckpointRegistry::new(&config.checkpoint.root_dir)
            .with_conflict_policy(config.checkpoint.conflict_policy),
    );
    let workloads = Arc::new(InMemoryWorkloadRegistry::with_workloads(config.workloads()));
    let backend = Arc::new(SimulatedBackend::new(
        Arc::clone(&registry),
        config.runtime.snapshot_delay,
    ));

    Arc::new(
        CheckpointCoordinator::new(workloads, backend, registry)
            .with_completion_timeout(config.checkpoint.completion_timeout),
    )
}

/// Run the API server until ctrl-c
pub async fn run_server(config: DaemonConfig) -> Result<()> {
    let addr = config.listen_addr()?;
    let coordinator = build_coordinator(&config);

    info!(
        "Serving {} workload(s), artifacts under {}",
        config.workloads.len(),
        coordinator.registry().checkpoint_root().display()
    );
    match config.checkpoint.completion_timeout {
        Some(timeout) => info!("Checkpoint completion timeout: {:?}", timeout),
        None => warn!("Checkpoint completion wait is unbounded"),
    }

    CheckpointApiServer::new(coordinator, addr)
        .start(shutdown_signal())
        .await
        .with_context(|| format!("API server on {addr} failed"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
