//! Pod checkpoint coordination
//!
//! - `record` - per-request state and the completion/release handshake
//! - `registry` - in-flight checkpoints keyed by workload identity
//! - `coordinator` - request handling from validation to release
//! - `result` - wire encoding of artifact locations
//! - `params` - request parameter parsing and validation

pub mod coordinator;
pub mod params;
pub mod record;
pub mod registry;
pub mod result;


pub use coordinator::{CheckpointCoordinator, CheckpointDelivery};
pub use params::{parse_container_names, validate_container_name, validate_container_names};
pub use record::{
    CancelReason, CheckpointOptions, CheckpointOutcome, CheckpointRecord, CheckpointTicket,
    CompletionSignal, ReleaseReason, ReleaseSignal,
};
pub use registry::{CheckpointRegistry, ConflictPolicy, CHECKPOINT_SUBDIR};
pub use result::{CheckpointResult, ResultContainer};
