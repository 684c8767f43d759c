//! Trait-based abstractions for the node collaborators
//!
//! The coordinator never talks to the workload registry or the container
//! runtime directly. Both sit behind traits so the daemon can wire real or
//! simulated implementations and tests can substitute mocks.

pub mod backend;
pub mod workload;

pub use backend::{CheckpointBackend, MockCheckpointBackend, SimulatedBackend};
pub use workload::{
    InMemoryWorkloadRegistry, Workload, WorkloadPhase, WorkloadRegistry, WorkloadUid,
};
