//! Worker control channel.
//!
//! Out-of-band from signaling. Each message is one line of JSON:
//! workers write [`WorkerControlMessage`] to stdout, and the orchestrator
//! writes [`SupervisorCommand`] to the worker's stdin.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle signals a worker reports to its orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerControlMessage {
    /// The worker finished startup and is joining its room.
    Ready,
    /// Periodic liveness signal.
    Heartbeat,
    /// A non-fatal error. The worker keeps running.
    Error {
        #[serde(default)]
        payload: Value,
    },
    /// End-of-session summary for external persistence.
    Summary {
        #[serde(default)]
        payload: Value,
    },
    /// The worker asks to be shut down.
    ShutdownRequest {
        #[serde(default)]
        reason: String,
    },
}

impl WorkerControlMessage {
    /// Parses one line of worker output.
    ///
    /// Returns `None` for lines that are not control messages (ordinary log
    /// output), so callers can pass everything through without pre-filtering.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }

    /// Encodes the message as a single line, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name, also used as a metric label.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            WorkerControlMessage::Ready => "ready",
            WorkerControlMessage::Heartbeat => "heartbeat",
            WorkerControlMessage::Error { .. } => "error",
            WorkerControlMessage::Summary { .. } => "summary",
            WorkerControlMessage::ShutdownRequest { .. } => "shutdown-request",
        }
    }
}

/// Commands the orchestrator sends to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SupervisorCommand {
    /// Finish up and exit. Followed by a forced kill if ignored.
    Shutdown { reason: String },
}

impl SupervisorCommand {
    /// Encodes the command as a newline-terminated line.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
