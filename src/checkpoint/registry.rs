//! Registry of in-flight checkpoints, at most one per workload
//!
//! Map mutations are serialized by a single mutex that is never held across
//! a signal operation or an await point.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::record::{CancelReason, CheckpointRecord, CheckpointTicket};
use crate::abstractions::{Workload, WorkloadUid};
use crate::error::{CheckpointError, Result};

/// Directory under the node root that holds checkpoint artifacts
pub const CHECKPOINT_SUBDIR: &str = "checkpoint";

/// What to do when a checkpoint is requested for a workload that already has one in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Refuse the new request
    #[default]
    Reject,
    /// Cancel the in-flight request and replace it
    Preempt,
}

pub struct CheckpointRegistry {
    checkpoint_root: PathBuf,
    conflict_policy: ConflictPolicy,
    records: Mutex<HashMap<WorkloadUid, Arc<CheckpointRecord>>>,
}

impl CheckpointRegistry {
    /// Create a registry storing artifacts under `<root_dir>/checkpoint`
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            checkpoint_root: root_dir.as_ref().join(CHECKPOINT_SUBDIR),
            conflict_policy: ConflictPolicy::default(),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn checkpoint_root(&self) -> &Path {
        &self.checkpoint_root
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    fn records(&self) -> MutexGuard<'_, HashMap<WorkloadUid, Arc<CheckpointRecord>>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new checkpoint for `workload`.
    ///
    /// Returns the shared record and the coordinator's ticket. An existing
    /// record for the same workload is rejected or preempted according to the
    /// conflict policy.
    pub fn create(
        &self,
        workload: &Workload,
        containers: Vec<String>,
    ) -> Result<(Arc<CheckpointRecord>, CheckpointTicket)> {
        let (record, ticket) = CheckpointRecord::new(
            workload.uid.clone(),
            workload.name.clone(),
            &self.checkpoint_root,
            containers,
        );
        let record = Arc::new(record);

        let replaced = {
            let mut records = self.records();
            if records.contains_key(&workload.uid) && self.conflict_policy == ConflictPolicy::Reject
            {
                return Err(CheckpointError::AlreadyInProgress(workload.uid.to_string()));
            }
            records.insert(workload.uid.clone(), Arc::clone(&record))
        };

        if let Some(previous) = replaced {
            warn!(
                "Preempting checkpoint {} of workload {} with {}",
                previous.id(),
                workload.uid,
                record.id()
            );
            previous.cancel(CancelReason::Preempted);
        }

        Ok((record, ticket))
    }

    /// Look up the in-flight checkpoint of a workload
    pub fn find(&self, uid: &WorkloadUid) -> Option<Arc<CheckpointRecord>> {
        self.records().get(uid).cloned()
    }

    /// Cancel and drop the checkpoint of a workload.
    ///
    /// Wakes the coordinator with a cancelled outcome. Returns false if the
    /// workload had no checkpoint.
    pub fn remove(&self, uid: &WorkloadUid) -> bool {
        let removed = self.records().remove(uid);
        match removed {
            Some(record) => {
                info!("Removed checkpoint {} of workload {}", record.id(), uid);
                record.cancel(CancelReason::Removed);
                true
            }
            None => {
                debug!("No checkpoint to remove for workload {}", uid);
                false
            }
        }
    }

    /// Drop `record` from the registry if it is still the workload's active
    /// record. Does not touch its signals.
    pub fn remove_record(&self, record: &CheckpointRecord) -> bool {
        let mut records = self.records();
        match records.get(record.uid()) {
            Some(active) if active.id() == record.id() => {
                records.remove(record.uid());
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Workloads that currently have a checkpoint in flight
    pub fn active_workloads(&self) -> Vec<WorkloadUid> {
        let mut uids: Vec<_> = self.records().keys().cloned().collect();
        uids.sort();
        uids
    }
}
