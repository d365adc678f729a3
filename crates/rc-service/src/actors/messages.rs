//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply uses `tokio::sync::oneshot`.

use crate::actors::connection::ConnectionHandle;
use crate::errors::RcError;
use common::signaling::{JoinRequest, PeerInfo, RelayEnvelope, ServerMessage, SignalKind};
use common::types::{ParticipantKind, ParticipantRole};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Messages sent to a `ConnectionActor`.
#[derive(Debug)]
pub enum ConnectionMessage {
    /// Write a frame to the socket.
    Send { message: ServerMessage },
    /// Close the socket.
    Close { reason: String },
}

/// Messages sent to the `RelayActor`.
#[derive(Debug)]
pub enum RelayMessage {
    /// Register a participant and deliver its peer list.
    Join {
        room_id: String,
        request: JoinRequest,
        connection: ConnectionHandle,
        /// Receives the peer list that was queued on `connection`.
        respond_to: oneshot::Sender<Result<Vec<PeerInfo>, RcError>>,
    },

    /// Forward an offer, answer or ICE candidate.
    Route {
        room_id: String,
        from_id: String,
        /// Connection the message arrived on, checked against the member entry.
        connection_id: String,
        kind: SignalKind,
        envelope: RelayEnvelope,
        received_at: Instant,
    },

    /// A participant left or its connection closed.
    Leave {
        room_id: String,
        participant_id: String,
        connection_id: String,
    },

    /// Snapshot of one room.
    GetRoom {
        room_id: String,
        respond_to: oneshot::Sender<Result<RoomSnapshot, RcError>>,
    },

    /// Relay totals.
    GetStatus {
        respond_to: oneshot::Sender<RelayStatus>,
    },

    /// Stop admitting participants and close every connection.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Optional fields of a spawn request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Generated when absent.
    pub session_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub secondary_id: Option<String>,
    /// Falls back to the configured default when absent.
    pub test_mode: Option<bool>,
}

/// Messages sent to the `OrchestratorActor`.
#[derive(Debug)]
pub enum OrchestratorMessage {
    Spawn {
        room_id: String,
        request: SpawnRequest,
        respond_to: oneshot::Sender<Result<WorkerInfo, RcError>>,
    },

    /// Ask the room's worker to exit. Replies `true` if a worker was active.
    Terminate {
        room_id: String,
        reason: TerminationReason,
        respond_to: oneshot::Sender<bool>,
    },

    ParticipantJoined {
        room_id: String,
        participant_id: String,
        role: ParticipantRole,
        kind: ParticipantKind,
    },

    ParticipantLeft {
        room_id: String,
        participant_id: String,
    },

    GetWorker {
        room_id: String,
        respond_to: oneshot::Sender<Option<WorkerInfo>>,
    },

    GetStatus {
        respond_to: oneshot::Sender<OrchestratorStatus>,
    },

    /// Terminate every worker and reply once all have exited.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Lifecycle status of a worker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStatus {
    Spawning,
    Ready,
    Unresponsive,
    Error,
    Terminated,
}

impl WorkerStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Spawning => "spawning",
            WorkerStatus::Ready => "ready",
            WorkerStatus::Unresponsive => "unresponsive",
            WorkerStatus::Error => "error",
            WorkerStatus::Terminated => "terminated",
        }
    }
}

/// Why a worker was asked to exit. Used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    RoomEmpty,
    IdleTimeout,
    MaxLifetime,
    Unresponsive,
    WorkerRequested,
    Manual,
    Shutdown,
}

impl TerminationReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::RoomEmpty => "room-empty",
            TerminationReason::IdleTimeout => "idle-timeout",
            TerminationReason::MaxLifetime => "max-lifetime",
            TerminationReason::Unresponsive => "unresponsive",
            TerminationReason::WorkerRequested => "worker-requested",
            TerminationReason::Manual => "manual",
            TerminationReason::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public view of a worker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub room_id: String,
    pub session_id: String,
    pub pid: Option<u32>,
    pub status: WorkerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,
    /// Unix timestamp.
    pub started_at: i64,
}

/// Worker lifecycle notifications published by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Spawned {
        room_id: String,
        session_id: String,
        pid: Option<u32>,
    },
    Ready {
        room_id: String,
        session_id: String,
    },
    /// The worker reported an error and keeps running.
    Error {
        room_id: String,
        session_id: String,
        payload: Value,
    },
    Summary {
        room_id: String,
        session_id: String,
        payload: Value,
    },
    /// First missed heartbeat interval.
    Unresponsive {
        room_id: String,
        session_id: String,
    },
    Terminated {
        room_id: String,
        session_id: String,
        pid: Option<u32>,
        reason: TerminationReason,
    },
    /// An active worker exited on its own with a failure status.
    Crashed {
        room_id: String,
        session_id: String,
        exit: String,
    },
    /// A worker process is gone, whether or not it was asked to go.
    Exited {
        room_id: String,
        session_id: String,
        exit: String,
    },
    /// An automatic spawn failed.
    SpawnFailed {
        room_id: String,
        error: String,
    },
}

impl WorkerEvent {
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            WorkerEvent::Spawned { room_id, .. }
            | WorkerEvent::Ready { room_id, .. }
            | WorkerEvent::Error { room_id, .. }
            | WorkerEvent::Summary { room_id, .. }
            | WorkerEvent::Unresponsive { room_id, .. }
            | WorkerEvent::Terminated { room_id, .. }
            | WorkerEvent::Crashed { room_id, .. }
            | WorkerEvent::Exited { room_id, .. }
            | WorkerEvent::SpawnFailed { room_id, .. } => room_id,
        }
    }
}

/// A participant inside a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub participant_id: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
    /// Unix timestamp.
    pub joined_at: i64,
}

/// Relay view of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub participants: Vec<ParticipantSummary>,
    /// Unix timestamp.
    pub created_at: i64,
}

/// Relay totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub room_count: usize,
    pub participant_count: usize,
    pub draining: bool,
}

/// Orchestrator totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    /// Workers not yet terminated.
    pub active_workers: usize,
    /// Terminated records still waiting for their process to exit.
    pub draining_workers: usize,
    pub max_workers: usize,
    pub draining: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_reason_labels() {
        assert_eq!(TerminationReason::RoomEmpty.as_str(), "room-empty");
        assert_eq!(TerminationReason::WorkerRequested.to_string(), "worker-requested");
        assert_eq!(
            serde_json::to_value(TerminationReason::MaxLifetime).unwrap(),
            "max-lifetime"
        );
    }

    #[test]
    fn test_worker_info_serializes_camel_case() {
        let info = WorkerInfo {
            room_id: "room-1".to_string(),
            session_id: "sess-1".to_string(),
            pid: Some(4242),
            status: WorkerStatus::Spawning,
            supervisor_id: Some("alice".to_string()),
            secondary_id: None,
            started_at: 1_700_000_000,
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["roomId"], "room-1");
        assert_eq!(value["status"], "spawning");
        assert_eq!(value["supervisorId"], "alice");
        assert!(value.get("secondaryId").is_none());
    }

    #[test]
    fn test_event_room_id() {
        let event = WorkerEvent::SpawnFailed {
            room_id: "room-9".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(event.room_id(), "room-9");
    }
}
