//! Workload registry abstraction
//!
//! Resolves a workload identifier to the live workload object. The node agent
//! owns the real registry; the in-memory implementation backs the daemon's
//! static workload table and the tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stable identity of a workload for its whole lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadUid(String);

impl WorkloadUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkloadUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

impl From<String> for WorkloadUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

/// Lifecycle phase of a workload as reported by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadPhase {
    Pending,
    #[default]
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkloadPhase {
    /// Only running workloads can be checkpointed
    pub fn is_checkpoint_eligible(&self) -> bool {
        matches!(self, WorkloadPhase::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadPhase::Pending => "pending",
            WorkloadPhase::Running => "running",
            WorkloadPhase::Succeeded => "succeeded",
            WorkloadPhase::Failed => "failed",
            WorkloadPhase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live workload (pod)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub uid: WorkloadUid,
    pub name: String,
    #[serde(default)]
    pub phase: WorkloadPhase,
}

impl Workload {
    pub fn new(uid: impl Into<WorkloadUid>, name: impl Into<String>, phase: WorkloadPhase) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            phase,
        }
    }
}

/// Trait for resolving workloads by identity
#[async_trait]
pub trait WorkloadRegistry: Send + Sync {
    /// Look up a workload; `None` means the node does not know it
    async fn get_by_uid(&self, uid: &WorkloadUid) -> Option<Workload>;
}

/// Workload registry backed by an in-memory table
#[derive(Default, Clone)]
pub struct InMemoryWorkloadRegistry {
    workloads: Arc<RwLock<HashMap<WorkloadUid, Workload>>>,
}

impl InMemoryWorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with the given workloads
    pub fn with_workloads(workloads: impl IntoIterator<Item = Workload>) -> Self {
        let table = workloads
            .into_iter()
            .map(|w| (w.uid.clone(), w))
            .collect::<HashMap<_, _>>();
        Self {
            workloads: Arc::new(RwLock::new(table)),
        }
    }

    /// Insert or replace a workload
    pub async fn upsert(&self, workload: Workload) {
        self.workloads
            .write()
            .await
            .insert(workload.uid.clone(), workload);
    }

    /// Update the phase of a known workload, returns false if unknown
    pub async fn set_phase(&self, uid: &WorkloadUid, phase: WorkloadPhase) -> bool {
        match self.workloads.write().await.get_mut(uid) {
            Some(workload) => {
                workload.phase = phase;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, uid: &WorkloadUid) -> Option<Workload> {
        self.workloads.write().await.remove(uid)
    }

    pub async fn len(&self) -> usize {
        self.workloads.read().await.len()
    }
}

#[async_trait]
impl WorkloadRegistry for InMemoryWorkloadRegistry {
    async fn get_by_uid(&self, uid: &WorkloadUid) -> Option<Workload> {
        self.workloads.read().await.get(uid).cloned()
    }
}
