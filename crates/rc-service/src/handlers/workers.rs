//! Worker control handlers.
//!
//! - `POST /v1/rooms/{room_id}/worker` - spawn a worker for a room
//! - `DELETE /v1/rooms/{room_id}/worker` - terminate it (idempotent)

use crate::actors::{SpawnRequest, TerminationReason, WorkerInfo};
use crate::errors::RcError;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Optional body of a spawn request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpawnWorkerRequest {
    pub session_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub secondary_id: Option<String>,
    pub test_mode: Option<bool>,
}

impl From<SpawnWorkerRequest> for SpawnRequest {
    fn from(body: SpawnWorkerRequest) -> Self {
        SpawnRequest {
            session_id: body.session_id,
            supervisor_id: body.supervisor_id,
            secondary_id: body.secondary_id,
            test_mode: body.test_mode,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TerminateWorkerResponse {
    /// False when the room had no active worker.
    pub terminated: bool,
}

/// Handler for POST /v1/rooms/{room_id}/worker
///
/// # Response
///
/// - 201 Created: worker info
/// - 400 Bad Request: malformed body or invalid identifiers
/// - 409 Conflict: the room already has a worker
/// - 429 Too Many Requests: global capacity reached
/// - 500 Internal Server Error: the process could not be started
/// - 503 Service Unavailable: shutting down
#[instrument(skip(state, body), fields(room_id = %room_id))]
pub async fn spawn_worker(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<WorkerInfo>), RcError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SpawnWorkerRequest::default()
    } else {
        serde_json::from_slice::<SpawnWorkerRequest>(&body)
            .map_err(|e| RcError::InvalidLaunchConfig(format!("invalid request body: {e}")))?
    };

    let info = state.orchestrator.spawn(room_id, request.into()).await?;

    info!(
        target: "rc.handlers.workers",
        room_id = %info.room_id,
        session_id = %info.session_id,
        "Worker spawned via API"
    );

    Ok((StatusCode::CREATED, Json(info)))
}

/// Handler for DELETE /v1/rooms/{room_id}/worker
///
/// Always 200; `terminated` says whether there was anything to stop.
#[instrument(skip(state), fields(room_id = %room_id))]
pub async fn terminate_worker(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<TerminateWorkerResponse>, RcError> {
    let terminated = state
        .orchestrator
        .terminate(room_id, TerminationReason::Manual)
        .await?;
    Ok(Json(TerminateWorkerResponse { terminated }))
}
