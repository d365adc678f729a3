//! Participant classification shared by the relay and the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The part a participant plays in a room.
///
/// A room holds at most two human operators and one automated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipantRole {
    /// The supervising operator. Their arrival may trigger a worker spawn.
    OperatorPrimary,
    /// A second human operator.
    OperatorSecondary,
    /// The automated participant backed by a worker process.
    AiWorker,
}

impl ParticipantRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::OperatorPrimary => "operator-primary",
            ParticipantRole::OperatorSecondary => "operator-secondary",
            ParticipantRole::AiWorker => "ai-worker",
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown participant role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for ParticipantRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator-primary" => Ok(ParticipantRole::OperatorPrimary),
            "operator-secondary" => Ok(ParticipantRole::OperatorSecondary),
            "ai-worker" => Ok(ParticipantRole::AiWorker),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Whether a participant is a person or an automated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Human,
    Ai,
}

/// Returns true when a participant with this role and kind is automated.
///
/// Either marker is enough: a participant announcing `kind: ai` with an
/// operator role is still treated as a worker.
#[must_use]
pub fn is_automated(role: ParticipantRole, kind: ParticipantKind) -> bool {
    role == ParticipantRole::AiWorker || kind == ParticipantKind::Ai
}
