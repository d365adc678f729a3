//! Pre-configured test data fixtures for RC testing.
//!
//! Provides join requests for each participant role and orchestrator
//! settings with auto-spawn off, so tests opt in to the behavior they check.

use common::signaling::JoinRequest;
use common::types::{ParticipantKind, ParticipantRole};
use rc_service::actors::OrchestratorSettings;

/// Join request for the supervising operator.
#[must_use]
pub fn operator_primary(participant_id: &str) -> JoinRequest {
    join_request(
        participant_id,
        ParticipantRole::OperatorPrimary,
        ParticipantKind::Human,
    )
}

/// Join request for the second human operator.
#[must_use]
pub fn operator_secondary(participant_id: &str) -> JoinRequest {
    join_request(
        participant_id,
        ParticipantRole::OperatorSecondary,
        ParticipantKind::Human,
    )
}

/// Join request for an AI worker.
#[must_use]
pub fn ai_worker(participant_id: &str) -> JoinRequest {
    join_request(participant_id, ParticipantRole::AiWorker, ParticipantKind::Ai)
}

#[must_use]
pub fn join_request(
    participant_id: &str,
    role: ParticipantRole,
    kind: ParticipantKind,
) -> JoinRequest {
    JoinRequest {
        room_id: None,
        participant_id: participant_id.to_string(),
        display_name: format!("Test {participant_id}"),
        role,
        kind,
    }
}

/// Default orchestrator settings with auto-spawn disabled.
#[must_use]
pub fn test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        auto_spawn: false,
        ..OrchestratorSettings::default()
    }
}

/// Default orchestrator settings with auto-spawn on operator-primary joins.
#[must_use]
pub fn auto_spawn_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        auto_spawn: true,
        spawn_trigger_role: ParticipantRole::OperatorPrimary,
        ..OrchestratorSettings::default()
    }
}
