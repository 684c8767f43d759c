//! Checkpoint request faults and their HTTP status mapping

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::checkpoint::CancelReason;

/// Faults returned by the checkpoint coordinator and its HTTP adapter
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Workload not found: {0}")]
    WorkloadNotFound(String),

    #[error("Workload {uid} is {phase}, checkpoint requires a running workload")]
    InvalidState { uid: String, phase: String },

    #[error("Checkpoint already in progress for workload {0}")]
    AlreadyInProgress(String),

    #[error("Invalid container name: {0:?}")]
    InvalidContainerName(String),

    #[error("Checkpoint of workload {uid} did not complete within {after:?}")]
    Timeout { uid: String, after: Duration },

    #[error("Checkpoint of workload {uid} was cancelled: {reason}")]
    Cancelled { uid: String, reason: CancelReason },

    #[error("Checkpoint of workload {uid} failed: {message}")]
    SnapshotFailed { uid: String, message: String },

    #[error("Signal already used: {0}")]
    SignalAlreadyUsed(&'static str),

    #[error("Failed to encode checkpoint result: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Failed to deliver checkpoint result: {0}")]
    Delivery(#[from] std::io::Error),
}

impl CheckpointError {
    /// HTTP status reported to the requester for this fault
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckpointError::WorkloadNotFound(_) => StatusCode::NOT_FOUND,
            CheckpointError::InvalidState { .. }
            | CheckpointError::AlreadyInProgress(_)
            | CheckpointError::Cancelled { .. } => StatusCode::CONFLICT,
            CheckpointError::InvalidContainerName(_) => StatusCode::BAD_REQUEST,
            CheckpointError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CheckpointError::SnapshotFailed { .. }
            | CheckpointError::SignalAlreadyUsed(_)
            | CheckpointError::Encoding(_)
            | CheckpointError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the fault was caused by the request rather than the node
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_wire_contract() {
        assert_eq!(
            CheckpointError::WorkloadNotFound("abc".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CheckpointError::InvalidState {
                uid: "abc".into(),
                phase: "pending".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CheckpointError::Timeout {
                uid: "abc".into(),
                after: Duration::from_secs(1)
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            CheckpointError::InvalidContainerName("..".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(CheckpointError::AlreadyInProgress("abc".into()).is_client_error());
        assert!(!CheckpointError::SnapshotFailed {
            uid: "abc".into(),
            message: "criu exited with 1".into()
        }
        .is_client_error());
    }

    #[test]
    fn test_cancelled_message_names_reason() {
        let err = CheckpointError::Cancelled {
            uid: "abc".into(),
            reason: CancelReason::Preempted,
        };
        assert!(err.to_string().contains("preempted"));
    }
}
