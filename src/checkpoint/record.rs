//! Per-request checkpoint state and the two handshake signals
//!
//! A record is shared between the coordinator (which created it and holds the
//! [`CheckpointTicket`]) and the container runtime (which reaches it through
//! [`CheckpointRecord::options`]). Each signal is a one-shot rendezvous:
//!
//! - completion: runtime (or a cancellation) → coordinator
//! - release: coordinator → runtime, only after the result was delivered

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::abstractions::WorkloadUid;
use crate::error::{CheckpointError, Result};

/// How a checkpoint ended, as reported on the completion signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// The runtime finished writing the snapshot
    Completed,
    /// The runtime gave up on the snapshot
    Failed { message: String },
    /// The record was torn down before the runtime finished
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    /// Removed from the registry
    Removed,
    /// Replaced by a newer request for the same workload
    Preempted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Removed => f.write_str("removed"),
            CancelReason::Preempted => f.write_str("preempted"),
        }
    }
}

/// Why the runtime was allowed to resume the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The requester received the result
    Delivered,
    /// The coordinator stopped waiting (timeout, cancellation, dropped request)
    Abandoned,
}

fn lock_slot<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sending half of the completion rendezvous, shared by the runtime and the registry
#[derive(Clone)]
pub struct CompletionSignal {
    tx: Arc<Mutex<Option<oneshot::Sender<CheckpointOutcome>>>>,
}

impl CompletionSignal {
    fn new(tx: oneshot::Sender<CheckpointOutcome>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Signal the outcome. Returns false if the signal was already used or
    /// the coordinator is no longer waiting.
    pub fn signal(&self, outcome: CheckpointOutcome) -> bool {
        let tx = lock_slot(&self.tx).take();
        match tx {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Whether the signal has already been used
    pub fn is_signaled(&self) -> bool {
        lock_slot(&self.tx).is_none()
    }
}

/// Receiving half of the release rendezvous, observed by the runtime
#[derive(Clone)]
pub struct ReleaseSignal {
    rx: Arc<Mutex<Option<oneshot::Receiver<ReleaseReason>>>>,
}

impl ReleaseSignal {
    fn new(rx: oneshot::Receiver<ReleaseReason>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Wait until the coordinator lets the workload resume.
    ///
    /// Call this only after signalling completion, otherwise it waits forever
    /// against the coordinator's own completion wait. A coordinator that goes
    /// away without releasing resolves as [`ReleaseReason::Abandoned`].
    pub async fn wait(&self) -> Result<ReleaseReason> {
        let rx = lock_slot(&self.rx)
            .take()
            .ok_or(CheckpointError::SignalAlreadyUsed("release"))?;
        Ok(rx.await.unwrap_or(ReleaseReason::Abandoned))
    }
}

/// Coordinator-side halves of a record's signals
///
/// Handed out once by the registry to whoever created the record.
#[derive(Debug)]
pub struct CheckpointTicket {
    pub(crate) completion: oneshot::Receiver<CheckpointOutcome>,
    pub(crate) release: oneshot::Sender<ReleaseReason>,
}

/// Everything the runtime needs to perform the snapshot
#[derive(Clone)]
pub struct CheckpointOptions {
    /// Directory the runtime writes per-container artifacts under
    pub checkpoint_dir: PathBuf,
    pub containers: Vec<String>,
    /// The workload must stay alive (paused, not torn down) while checkpointing
    pub keep_running: bool,
    pub completion: CompletionSignal,
    pub release: ReleaseSignal,
}

/// An in-flight checkpoint of one workload
pub struct CheckpointRecord {
    id: Uuid,
    uid: WorkloadUid,
    workload_name: String,
    checkpoint_dir: PathBuf,
    containers: Vec<String>,
    created_at: DateTime<Utc>,
    completion: CompletionSignal,
    release: ReleaseSignal,
}

impl CheckpointRecord {
    /// Create a record whose artifacts live under `checkpoint_root/<workload name>`
    pub fn new(
        uid: WorkloadUid,
        workload_name: impl Into<String>,
        checkpoint_root: &Path,
        containers: Vec<String>,
    ) -> (Self, CheckpointTicket) {
        let workload_name = workload_name.into();
        let (completion_tx, completion_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();

        let record = Self {
            id: Uuid::new_v4(),
            checkpoint_dir: checkpoint_root.join(&workload_name),
            uid,
            workload_name,
            containers,
            created_at: Utc::now(),
            completion: CompletionSignal::new(completion_tx),
            release: ReleaseSignal::new(release_rx),
        };
        debug!(
            "Created checkpoint record {} for workload {} at {}",
            record.id,
            record.uid,
            record.checkpoint_dir.display()
        );

        let ticket = CheckpointTicket {
            completion: completion_rx,
            release: release_tx,
        };
        (record, ticket)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn uid(&self) -> &WorkloadUid {
        &self.uid
    }

    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn containers(&self) -> &[String] {
        &self.containers
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the completion signal has been used
    pub fn is_completion_signaled(&self) -> bool {
        self.completion.is_signaled()
    }

    /// Capability surface consumed by the container runtime
    pub fn options(&self) -> CheckpointOptions {
        CheckpointOptions {
            checkpoint_dir: self.checkpoint_dir.clone(),
            containers: self.containers.clone(),
            keep_running: true,
            completion: self.completion.clone(),
            release: self.release.clone(),
        }
    }

    /// Report the runtime's outcome on the completion signal
    pub fn signal_completion(&self, outcome: CheckpointOutcome) -> bool {
        self.completion.signal(outcome)
    }

    /// Block until the coordinator releases the workload.
    ///
    /// Must only be called after completion has been signalled.
    pub async fn wait_for_release(&self) -> Result<ReleaseReason> {
        self.release.wait().await
    }

    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        self.completion.signal(CheckpointOutcome::Cancelled(reason))
    }
}

impl fmt::Debug for CheckpointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointRecord")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("workload_name", &self.workload_name)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .field("containers", &self.containers)
            .field("completed", &self.completion.is_signaled())
            .finish()
    }
}
