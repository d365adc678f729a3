//! Room Controller error types.
//!
//! Errors map to stable string codes for the HTTP control API and for
//! signaling `error` frames. Internal details are logged server-side but not
//! exposed to clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Room Controller error type.
///
/// Spawn-path errors (`CapacityExceeded`, `SpawnFailure`, `WorkerAlreadyRunning`)
/// are returned synchronously to whoever asked for the spawn. `ProcessCrash` and
/// `Unresponsive` describe asynchronous worker failures and only travel through
/// lifecycle events and logs. `DeliveryDropped` and `InvalidMessage` are
/// per-message and never abort a room.
#[derive(Debug, Error)]
pub enum RcError {
    /// Global worker capacity reached.
    #[error("Worker capacity exceeded ({0} active)")]
    CapacityExceeded(usize),

    /// The worker process could not be launched.
    #[error("Spawn failure: {0}")]
    SpawnFailure(String),

    /// The launch configuration failed validation.
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunchConfig(String),

    /// The room already has an active worker.
    #[error("Worker already running for room {0}")]
    WorkerAlreadyRunning(String),

    /// A worker exited unexpectedly.
    #[error("Worker process crashed: {0}")]
    ProcessCrash(String),

    /// A worker missed its heartbeats.
    #[error("Worker unresponsive: {0}")]
    Unresponsive(String),

    /// A signaling message could not be delivered.
    #[error("Delivery dropped: {0}")]
    DeliveryDropped(String),

    /// A signaling message was malformed or not valid in the current state.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The room already holds the maximum number of participants.
    #[error("Room is full: {0}")]
    RoomFull(String),

    /// Room not found.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// The service is shutting down.
    #[error("Room Controller is draining")]
    Draining,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RcError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            RcError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            RcError::SpawnFailure(_) => "SPAWN_FAILURE",
            RcError::InvalidLaunchConfig(_) => "INVALID_LAUNCH_CONFIG",
            RcError::WorkerAlreadyRunning(_) => "WORKER_ALREADY_RUNNING",
            RcError::ProcessCrash(_) => "PROCESS_CRASH",
            RcError::Unresponsive(_) => "UNRESPONSIVE",
            RcError::DeliveryDropped(_) => "DELIVERY_DROPPED",
            RcError::InvalidMessage(_) => "INVALID_MESSAGE",
            RcError::RoomFull(_) => "ROOM_FULL",
            RcError::RoomNotFound(_) => "NOT_FOUND",
            RcError::Draining => "DRAINING",
            RcError::Config(_) | RcError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            RcError::InvalidLaunchConfig(_) | RcError::InvalidMessage(_) => 400,
            RcError::RoomNotFound(_) => 404,
            RcError::WorkerAlreadyRunning(_) | RcError::RoomFull(_) => 409,
            RcError::CapacityExceeded(_) => 429,
            RcError::Draining => 503,
            RcError::SpawnFailure(_)
            | RcError::ProcessCrash(_)
            | RcError::Unresponsive(_)
            | RcError::DeliveryDropped(_)
            | RcError::Config(_)
            | RcError::Internal(_) => 500,
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RcError::CapacityExceeded(_) => {
                "No worker capacity available, please try again later".to_string()
            }
            RcError::SpawnFailure(_) | RcError::ProcessCrash(_) | RcError::Unresponsive(_) => {
                "The AI participant is unavailable".to_string()
            }
            RcError::InvalidLaunchConfig(msg) | RcError::InvalidMessage(msg) => msg.clone(),
            RcError::WorkerAlreadyRunning(_) => {
                "An AI participant is already running for this room".to_string()
            }
            RcError::DeliveryDropped(_) => "Message could not be delivered".to_string(),
            RcError::RoomFull(_) => "Room is full".to_string(),
            RcError::RoomNotFound(_) => "Room not found".to_string(),
            RcError::Draining => "Server is shutting down, please reconnect".to_string(),
            RcError::Config(_) | RcError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Returns a bounded label for metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            RcError::CapacityExceeded(_) => "capacity_exceeded",
            RcError::SpawnFailure(_) => "spawn_failure",
            RcError::InvalidLaunchConfig(_) => "invalid_launch_config",
            RcError::WorkerAlreadyRunning(_) => "worker_already_running",
            RcError::ProcessCrash(_) => "process_crash",
            RcError::Unresponsive(_) => "unresponsive",
            RcError::DeliveryDropped(_) => "delivery_dropped",
            RcError::InvalidMessage(_) => "invalid_message",
            RcError::RoomFull(_) => "room_full",
            RcError::RoomNotFound(_) => "room_not_found",
            RcError::Draining => "draining",
            RcError::Config(_) => "config",
            RcError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for RcError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(target: "rc.http", error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.client_message(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_codes() {
        assert_eq!(RcError::CapacityExceeded(5).error_code(), "CAPACITY_EXCEEDED");
        assert_eq!(
            RcError::SpawnFailure("enoent".to_string()).error_code(),
            "SPAWN_FAILURE"
        );
        assert_eq!(
            RcError::WorkerAlreadyRunning("room-1".to_string()).error_code(),
            "WORKER_ALREADY_RUNNING"
        );
        assert_eq!(RcError::Draining.error_code(), "DRAINING");
        assert_eq!(
            RcError::Internal("x".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
        assert_eq!(
            RcError::Config("x".to_string()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RcError::CapacityExceeded(1).status_code(), 429);
        assert_eq!(
            RcError::InvalidLaunchConfig("bad".to_string()).status_code(),
            400
        );
        assert_eq!(RcError::RoomNotFound("r".to_string()).status_code(), 404);
        assert_eq!(RcError::RoomFull("r".to_string()).status_code(), 409);
        assert_eq!(RcError::Draining.status_code(), 503);
        assert_eq!(RcError::SpawnFailure("x".to_string()).status_code(), 500);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = RcError::SpawnFailure("No such file: /opt/worker/bin".to_string());
        assert!(!err.client_message().contains("/opt/worker"));

        let err = RcError::Internal("channel send failed: closed".to_string());
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = RcError::InvalidLaunchConfig("room id contains '/'".to_string());
        assert_eq!(err.client_message(), "room id contains '/'");
    }

    #[test]
    fn test_error_type_labels_are_snake_case() {
        let errors = [
            RcError::CapacityExceeded(1),
            RcError::ProcessCrash("x".to_string()),
            RcError::Unresponsive("x".to_string()),
            RcError::DeliveryDropped("x".to_string()),
            RcError::InvalidMessage("x".to_string()),
        ];
        for err in errors {
            let label = err.error_type();
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[tokio::test]
    async fn test_into_response_envelope() {
        let response = RcError::CapacityExceeded(3).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "CAPACITY_EXCEEDED");
        assert!(value["error"]["message"].is_string());
    }
}
