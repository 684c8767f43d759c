//! Request handlers for the checkpoint endpoints

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use futures::stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use super::ErrorBody;
use crate::abstractions::WorkloadUid;
use crate::checkpoint::{parse_container_names, CheckpointCoordinator, CheckpointDelivery};
use crate::error::CheckpointError;

/// Shared API state
pub struct ApiState {
    pub coordinator: Arc<CheckpointCoordinator>,
}

/// Query parameters of a checkpoint request
#[derive(Debug, Deserialize)]
pub struct CheckpointQuery {
    /// Comma separated container names
    pub containers: Option<String>,
}

/// In-flight checkpoint as reported by the status endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointStatus {
    pub pod_uid: String,
    pub workload: String,
    pub checkpoint_dir: String,
    pub containers: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed: bool,
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// POST /checkpoint/{pod_uid}?containers=a,b
pub async fn handle_checkpoint(
    State(state): State<Arc<ApiState>>,
    Path(pod_uid): Path<String>,
    Query(query): Query<CheckpointQuery>,
) -> Result<Response, CheckpointError> {
    let uid = WorkloadUid::from(pod_uid);
    let containers = parse_container_names(query.containers.as_deref());

    let delivery = state
        .coordinator
        .handle_checkpoint_request(&uid, containers)
        .await?;
    let body = delivery.encode()?;
    debug!("Sending checkpoint result of workload {} ({} bytes)", uid, body.len());

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        release_after_body(body, delivery),
    )
        .into_response())
}

enum BodyState {
    Pending(Vec<u8>, CheckpointDelivery),
    Sent(CheckpointDelivery),
}

/// Stream `body` and release the runtime once the connection asks for more,
/// i.e. after the result has been handed over. A body dropped before that
/// (client went away) releases the runtime as abandoned.
fn release_after_body(body: Vec<u8>, delivery: CheckpointDelivery) -> Body {
    let chunks = stream::unfold(BodyState::Pending(body, delivery), |state| async move {
        match state {
            BodyState::Pending(body, delivery) => {
                Some((Ok::<_, Infallible>(body), BodyState::Sent(delivery)))
            }
            BodyState::Sent(delivery) => {
                delivery.release();
                None
            }
        }
    });
    Body::from_stream(chunks)
}

/// GET /checkpoint/{pod_uid}
pub async fn checkpoint_status(
    State(state): State<Arc<ApiState>>,
    Path(pod_uid): Path<String>,
) -> Response {
    let uid = WorkloadUid::from(pod_uid);
    match state.coordinator.registry().find(&uid) {
        Some(record) => Json(CheckpointStatus {
            pod_uid: uid.to_string(),
            workload: record.workload_name().to_string(),
            checkpoint_dir: record.checkpoint_dir().to_string_lossy().into_owned(),
            containers: record.containers().to_vec(),
            started_at: record.created_at(),
            completed: record.is_completion_signaled(),
        })
        .into_response(),
        None => not_in_progress(&uid),
    }
}

/// DELETE /checkpoint/{pod_uid}
pub async fn cancel_checkpoint(
    State(state): State<Arc<ApiState>>,
    Path(pod_uid): Path<String>,
) -> Response {
    let uid = WorkloadUid::from(pod_uid);
    if state.coordinator.registry().remove(&uid) {
        warn!("Checkpoint of workload {} cancelled through the API", uid);
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_in_progress(&uid)
    }
}

fn not_in_progress(uid: &WorkloadUid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("No checkpoint in progress for workload {uid}"),
        }),
    )
        .into_response()
}
