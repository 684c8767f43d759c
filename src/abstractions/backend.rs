//! Checkpoint backend abstraction
//!
//! The backend is the container runtime side of the handshake. Triggering is
//! fire-and-continue: the call resolves the record by workload identity,
//! schedules the snapshot and returns. The snapshot later signals completion
//! on that record and waits for release before resuming the workload.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::workload::{Workload, WorkloadUid};
use crate::checkpoint::{CheckpointOutcome, CheckpointRecord, CheckpointRegistry, ReleaseReason};

/// Trait for starting a checkpoint on the container runtime
pub trait CheckpointBackend: Send + Sync {
    /// Schedule a checkpoint of `workload`. Must not wait for the snapshot.
    fn trigger_checkpoint(&self, workload: &Workload);
}

/// Runtime stand-in that completes every checkpoint after a fixed delay.
///
/// Writes no artifacts; it only drives the completion and release signals
/// the way a container runtime would.
pub struct SimulatedBackend {
    registry: Arc<CheckpointRegistry>,
    snapshot_delay: Duration,
}

impl SimulatedBackend {
    pub fn new(registry: Arc<CheckpointRegistry>, snapshot_delay: Duration) -> Self {
        Self {
            registry,
            snapshot_delay,
        }
    }

    async fn run_snapshot(record: Arc<CheckpointRecord>, delay: Duration) {
        let uid = record.uid().clone();
        let options = record.options();
        debug!(
            "Snapshotting {} container(s) of workload {} into {} (keep_running={})",
            options.containers.len(),
            uid,
            options.checkpoint_dir.display(),
            options.keep_running
        );

        tokio::time::sleep(delay).await;

        if !options.completion.signal(CheckpointOutcome::Completed) {
            warn!("Checkpoint of workload {} was no longer awaited", uid);
        }

        match options.release.wait().await {
            Ok(ReleaseReason::Delivered) => info!("Resuming workload {} after checkpoint", uid),
            Ok(ReleaseReason::Abandoned) => {
                warn!("Checkpoint of workload {} abandoned, resuming anyway", uid)
            }
            Err(e) => warn!("Could not wait for release of workload {}: {}", uid, e),
        }
    }
}

impl CheckpointBackend for SimulatedBackend {
    fn trigger_checkpoint(&self, workload: &Workload) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot schedule checkpoint of {}: {}", workload.uid, e);
                return;
            }
        };
        // resolve now; by the time the task runs a newer request may own the uid
        let Some(record) = self.registry.find(&workload.uid) else {
            warn!("No checkpoint registered for workload {}, skipping snapshot", workload.uid);
            return;
        };
        handle.spawn(Self::run_snapshot(record, self.snapshot_delay));
    }
}

/// Mock backend recording every trigger for tests
#[derive(Default)]
pub struct MockCheckpointBackend {
    triggered: Mutex<Vec<Workload>>,
    notify: Option<mpsc::UnboundedSender<Workload>>,
}

impl MockCheckpointBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that also forwards each triggered workload to the returned receiver
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<Workload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Self {
            triggered: Mutex::new(Vec::new()),
            notify: Some(tx),
        };
        (backend, rx)
    }

    pub fn triggered(&self) -> Vec<WorkloadUid> {
        self.triggered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|w| w.uid.clone())
            .collect()
    }
}

impl CheckpointBackend for MockCheckpointBackend {
    fn trigger_checkpoint(&self, workload: &Workload) {
        self.triggered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(workload.clone());
        if let Some(tx) = &self.notify {
            let _ = tx.send(workload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::WorkloadPhase;
    use crate::checkpoint::{CancelReason, ConflictPolicy};

    #[test]
    fn test_mock_records_triggers() {
        let (backend, mut rx) = MockCheckpointBackend::with_channel();
        let workload = Workload::new("uid-1", "pod1", WorkloadPhase::Running);

        backend.trigger_checkpoint(&workload);

        assert_eq!(backend.triggered(), vec![WorkloadUid::from("uid-1")]);
        assert_eq!(rx.try_recv().unwrap().name, "pod1");
    }

    #[tokio::test]
    async fn test_simulated_backend_completes_and_waits_for_release() {
        let registry = Arc::new(CheckpointRegistry::new("/ckpt"));
        let workload = Workload::new("uid-1", "pod1", WorkloadPhase::Running);
        let (record, ticket) = registry.create(&workload, vec!["a".into()]).unwrap();

        let backend = SimulatedBackend::new(Arc::clone(&registry), Duration::from_millis(5));
        backend.trigger_checkpoint(&workload);

        assert_eq!(ticket.completion.await.unwrap(), CheckpointOutcome::Completed);
        assert!(ticket.release.send(ReleaseReason::Delivered).is_ok());

        // the runtime consumed the release signal
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(record.wait_for_release().await.is_err());
    }

    #[tokio::test]
    async fn test_simulated_snapshot_stays_bound_to_triggered_record() {
        let registry = Arc::new(
            CheckpointRegistry::new("/ckpt").with_conflict_policy(ConflictPolicy::Preempt),
        );
        let workload = Workload::new("uid-1", "pod1", WorkloadPhase::Running);
        let backend = SimulatedBackend::new(Arc::clone(&registry), Duration::ZERO);

        let (_first, first_ticket) = registry.create(&workload, vec!["a".into()]).unwrap();
        backend.trigger_checkpoint(&workload);
        // preempt before the snapshot task got a chance to run
        let (_second, second_ticket) = registry.create(&workload, vec!["b".into()]).unwrap();

        assert_eq!(
            first_ticket.completion.await.unwrap(),
            CheckpointOutcome::Cancelled(CancelReason::Preempted)
        );
        let stolen =
            tokio::time::timeout(Duration::from_millis(50), second_ticket.completion).await;
        assert!(stolen.is_err(), "stale snapshot completed the newer checkpoint");
    }

    #[tokio::test]
    async fn test_simulated_backend_skips_unknown_workload() {
        let registry = Arc::new(CheckpointRegistry::new("/ckpt"));
        let backend = SimulatedBackend::new(Arc::clone(&registry), Duration::ZERO);

        backend.trigger_checkpoint(&Workload::new("ghost", "ghost", WorkloadPhase::Running));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.is_empty());
    }
}
