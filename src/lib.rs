//! # pod-checkpoint
//!
//! Coordinates checkpoint requests for running pods with an asynchronous
//! container runtime. A request registers a checkpoint record, triggers the
//! runtime, waits until the runtime reports completion, answers with the
//! artifact location of every requested container, and only then lets the
//! runtime resume the pod.
//!
//! ## Usage
//!
//! ```bash
//! pod-checkpointd -c /etc/pod-checkpoint.toml serve
//! curl -X POST 'http://127.0.0.1:10255/checkpoint/<pod-uid>?containers=web,sidecar'
//! ```
//!
//! ## Modules
//!
//! - `abstractions` - Trait seams for the workload registry and the container runtime
//! - `api` - HTTP endpoints over the coordinator
//! - `app` - Logging, fatal error handling, and server wiring for the daemon
//! - `checkpoint` - Checkpoint records, registry, coordinator, and result encoding
//! - `config` - Daemon configuration loading and validation
//! - `error` - Faults returned to checkpoint requesters
pub mod abstractions;
pub mod api;
pub mod app;
pub mod checkpoint;
pub mod config;
pub mod error;

pub use abstractions::{Workload, WorkloadPhase, WorkloadUid};
pub use checkpoint::{
    CheckpointCoordinator, CheckpointDelivery, CheckpointOutcome, CheckpointRegistry,
    CheckpointResult,
};
pub use error::{CheckpointError, Result};
