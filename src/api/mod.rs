//! HTTP adapter for the checkpoint coordinator
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `GET` | `/healthz` | liveness |
//! | `POST` | `/checkpoint/{pod_uid}?containers=a,b` | checkpoint and wait for the result |
//! | `GET` | `/checkpoint/{pod_uid}` | in-flight checkpoint status |
//! | `DELETE` | `/checkpoint/{pod_uid}` | cancel an in-flight checkpoint |

pub mod handlers;
pub mod server;

use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CheckpointError;

pub use handlers::{CheckpointQuery, CheckpointStatus};
pub use server::{build_router, serve, CheckpointApiServer};

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for CheckpointError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Checkpoint request failed: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
