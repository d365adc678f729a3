//! Room and service status handlers.

use crate::actors::{ParticipantSummary, WorkerInfo};
use crate::errors::RcError;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub room_id: String,
    pub participants: Vec<ParticipantSummary>,
    pub worker: Option<WorkerInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub rooms: usize,
    pub participants: usize,
    pub connections: usize,
    pub workers: usize,
    pub draining_workers: usize,
    pub max_workers: usize,
    pub draining: bool,
}

/// Handler for GET /v1/rooms/{room_id}
///
/// 404 only when the relay has no such room and no worker is assigned to it.
#[instrument(skip(state), fields(room_id = %room_id))]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, RcError> {
    let participants = match state.relay.get_room(room_id.clone()).await {
        Ok(snapshot) => Some(snapshot.participants),
        Err(RcError::RoomNotFound(_)) => None,
        Err(e) => return Err(e),
    };
    let worker = state.orchestrator.get_worker(room_id.clone()).await?;

    if participants.is_none() && worker.is_none() {
        return Err(RcError::RoomNotFound(room_id));
    }

    Ok(Json(RoomResponse {
        room_id,
        participants: participants.unwrap_or_default(),
        worker,
    }))
}

/// Handler for GET /v1/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, RcError> {
    let relay = state.relay.get_status().await?;
    let orchestrator = state.orchestrator.get_status().await?;

    Ok(Json(StatusResponse {
        rooms: relay.room_count,
        participants: relay.participant_count,
        connections: state.metrics.connection_count(),
        workers: orchestrator.active_workers,
        draining_workers: orchestrator.draining_workers,
        max_workers: orchestrator.max_workers,
        draining: relay.draining || orchestrator.draining,
    }))
}
