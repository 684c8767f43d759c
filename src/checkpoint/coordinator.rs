//! Checkpoint coordinator
//!
//! Runs one checkpoint request end to end: resolve the workload, register a
//! record, hand off to the runtime, wait for completion, and hand the result
//! back as a [`CheckpointDelivery`]. The runtime is only released once the
//! delivery has been written out (or abandoned).

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::params::validate_container_names;
use super::record::{
    CancelReason, CheckpointOutcome, CheckpointRecord, CheckpointTicket, ReleaseReason,
};
use super::registry::CheckpointRegistry;
use super::result::CheckpointResult;
use crate::abstractions::{CheckpointBackend, WorkloadRegistry, WorkloadUid};
use crate::error::{CheckpointError, Result};

pub struct CheckpointCoordinator {
    workloads: Arc<dyn WorkloadRegistry>,
    backend: Arc<dyn CheckpointBackend>,
    registry: Arc<CheckpointRegistry>,
    completion_timeout: Option<Duration>,
}

impl CheckpointCoordinator {
    /// Create a coordinator that waits for completion without a deadline
    pub fn new(
        workloads: Arc<dyn WorkloadRegistry>,
        backend: Arc<dyn CheckpointBackend>,
        registry: Arc<CheckpointRegistry>,
    ) -> Self {
        Self {
            workloads,
            backend,
            registry,
            completion_timeout: None,
        }
    }

    /// Bound the wait for the runtime's completion signal
    pub fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<CheckpointRegistry> {
        &self.registry
    }

    pub fn completion_timeout(&self) -> Option<Duration> {
        self.completion_timeout
    }

    /// Checkpoint `containers` of the workload identified by `uid`.
    ///
    /// Suspends until the runtime signals completion. On success the returned
    /// delivery still holds the runtime paused; deliver or release it to let
    /// the workload resume.
    pub async fn handle_checkpoint_request(
        &self,
        uid: &WorkloadUid,
        containers: Vec<String>,
    ) -> Result<CheckpointDelivery> {
        info!("Checkpoint requested for workload {}: {:?}", uid, containers);

        let workload = self
            .workloads
            .get_by_uid(uid)
            .await
            .ok_or_else(|| CheckpointError::WorkloadNotFound(uid.to_string()))?;

        if !workload.phase.is_checkpoint_eligible() {
            return Err(CheckpointError::InvalidState {
                uid: uid.to_string(),
                phase: workload.phase.to_string(),
            });
        }

        validate_container_names(&containers)?;

        let (record, ticket) = self.registry.create(&workload, containers)?;
        let pending = PendingRecord::new(Arc::clone(&self.registry), Arc::clone(&record));
        let CheckpointTicket {
            completion,
            release,
        } = ticket;

        info!("Starting checkpoint of workload {}", workload.name);
        self.backend.trigger_checkpoint(&workload);

        match self.wait_for_completion(uid, completion).await? {
            CheckpointOutcome::Completed => {
                debug!("Checkpoint {} of workload {} completed", record.id(), uid);
                // the delivery owns registry cleanup from here on
                pending.disarm();
                let result = CheckpointResult::from_containers(record.checkpoint_dir(), record.containers());
                Ok(CheckpointDelivery {
                    result,
                    record,
                    registry: Arc::clone(&self.registry),
                    release: Some(release),
                })
            }
            CheckpointOutcome::Failed { message } => {
                warn!("Checkpoint of workload {} failed: {}", uid, message);
                Err(CheckpointError::SnapshotFailed {
                    uid: uid.to_string(),
                    message,
                })
            }
            CheckpointOutcome::Cancelled(reason) => {
                warn!("Checkpoint of workload {} cancelled: {}", uid, reason);
                Err(CheckpointError::Cancelled {
                    uid: uid.to_string(),
                    reason,
                })
            }
        }
    }

    async fn wait_for_completion(
        &self,
        uid: &WorkloadUid,
        completion: oneshot::Receiver<CheckpointOutcome>,
    ) -> Result<CheckpointOutcome> {
        let received = match self.completion_timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.map_err(|_| {
                warn!("Checkpoint of workload {} did not complete within {:?}", uid, limit);
                CheckpointError::Timeout {
                    uid: uid.to_string(),
                    after: limit,
                }
            })?,
            None => completion.await,
        };

        // every completion sender went away without a word: the record was torn down
        Ok(received.unwrap_or(CheckpointOutcome::Cancelled(CancelReason::Removed)))
    }
}

/// Registry entry of a request that has not produced a delivery yet.
///
/// Dropped on every early exit, including the request future itself being
/// dropped mid-wait, so the workload never keeps a stale record.
struct PendingRecord {
    registry: Arc<CheckpointRegistry>,
    record: Arc<CheckpointRecord>,
    armed: bool,
}

impl PendingRecord {
    fn new(registry: Arc<CheckpointRegistry>, record: Arc<CheckpointRecord>) -> Self {
        Self {
            registry,
            record,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRecord {
    fn drop(&mut self) {
        if self.armed && self.registry.remove_record(&self.record) {
            debug!(
                "Cleared checkpoint {} of workload {}",
                self.record.id(),
                self.record.uid()
            );
        }
    }
}

/// A completed checkpoint whose runtime is still waiting to be released
///
/// Releasing happens exactly once: through [`deliver`](Self::deliver),
/// [`release`](Self::release), or as [`ReleaseReason::Abandoned`] when the
/// delivery is dropped. The registry entry is cleared at the same time.
pub struct CheckpointDelivery {
    result: CheckpointResult,
    record: Arc<CheckpointRecord>,
    registry: Arc<CheckpointRegistry>,
    release: Option<oneshot::Sender<ReleaseReason>>,
}

impl CheckpointDelivery {
    pub fn result(&self) -> &CheckpointResult {
        &self.result
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    /// Encode the result for the wire
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.result.to_json()
    }

    /// Write the encoded result to `writer`, then release the runtime.
    ///
    /// If encoding or writing fails the runtime is released as abandoned.
    pub async fn deliver<W>(mut self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let body = self.encode()?;
        writer.write_all(&body).await?;
        writer.flush().await?;
        self.finish(ReleaseReason::Delivered);
        Ok(())
    }

    /// Release the runtime after the result was delivered by other means
    pub fn release(mut self) {
        self.finish(ReleaseReason::Delivered);
    }

    fn finish(&mut self, reason: ReleaseReason) {
        let Some(release) = self.release.take() else {
            return;
        };
        let uid = self.record.uid();
        if release.send(reason).is_err() {
            debug!("Runtime for workload {} stopped waiting for release", uid);
        }
        match reason {
            ReleaseReason::Delivered => info!("Released workload {} after checkpoint", uid),
            ReleaseReason::Abandoned => warn!("Abandoned checkpoint result of workload {}", uid),
        }
        self.registry.remove_record(&self.record);
    }
}

impl Drop for CheckpointDelivery {
    fn drop(&mut self) {
        self.finish(ReleaseReason::Abandoned);
    }
}
