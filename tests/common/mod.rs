//! Common test utilities and helpers

#![allow(dead_code)]

use pod_checkpoint::abstractions::{
    CheckpointBackend, InMemoryWorkloadRegistry, MockCheckpointBackend, SimulatedBackend,
    Workload, WorkloadPhase,
};
use pod_checkpoint::api;
use pod_checkpoint::checkpoint::{CheckpointCoordinator, CheckpointRegistry, ConflictPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const ROOT_DIR: &str = "/ckpt";

/// Workloads known to every test node
pub fn node_workloads() -> Vec<Workload> {
    vec![
        Workload::new("uid-1", "pod1", WorkloadPhase::Running),
        Workload::new("uid-2", "pod2", WorkloadPhase::Running),
        Workload::new("uid-pending", "starting", WorkloadPhase::Pending),
        Workload::new("uid-done", "finished", WorkloadPhase::Succeeded),
    ]
}

/// Builder for a coordinator wired to in-memory collaborators
pub struct TestNodeBuilder {
    policy: ConflictPolicy,
    timeout: Option<Duration>,
}

pub struct TestNode {
    pub coordinator: Arc<CheckpointCoordinator>,
    pub registry: Arc<CheckpointRegistry>,
}

impl TestNodeBuilder {
    pub fn new() -> Self {
        Self {
            policy: ConflictPolicy::Reject,
            timeout: None,
        }
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn registry(&self) -> Arc<CheckpointRegistry> {
        Arc::new(CheckpointRegistry::new(ROOT_DIR).with_conflict_policy(self.policy))
    }

    fn assemble(self, registry: Arc<CheckpointRegistry>, backend: Arc<dyn CheckpointBackend>) -> TestNode {
        let workloads = Arc::new(InMemoryWorkloadRegistry::with_workloads(node_workloads()));
        let coordinator = CheckpointCoordinator::new(workloads, backend, Arc::clone(&registry))
            .with_completion_timeout(self.timeout);
        TestNode {
            coordinator: Arc::new(coordinator),
            registry,
        }
    }

    /// Node whose runtime completes every checkpoint after `delay`
    pub fn simulated(self, delay: Duration) -> TestNode {
        let registry = self.registry();
        let backend = Arc::new(SimulatedBackend::new(Arc::clone(&registry), delay));
        self.assemble(registry, backend)
    }

    /// Node whose runtime only reports triggers; the test drives the handshake
    pub fn scripted(self) -> (TestNode, mpsc::UnboundedReceiver<Workload>) {
        let registry = self.registry();
        let (backend, triggers) = MockCheckpointBackend::with_channel();
        (self.assemble(registry, Arc::new(backend)), triggers)
    }
}

/// A running API server bound to an ephemeral port
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(coordinator: Arc<CheckpointCoordinator>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            api::serve(listener, coordinator, async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Poll `check` until it returns true or `timeout` elapses
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
