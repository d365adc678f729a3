//! Room signaling protocol.
//!
//! Participants connect to a room-scoped WebSocket and exchange JSON text
//! frames. Every frame is an object tagged by `"type"` with camelCase fields:
//!
//! ```text
//! participant -> relay   join, offer, answer, ice-candidate, leave, ping, pong
//! relay -> participant   peer-discovery, user-joined, offer, answer,
//!                        ice-candidate, user-left, error, ping, pong
//! ```
//!
//! Negotiation payloads (SDP, ICE candidates) are opaque to the relay and
//! carried as arbitrary JSON in `payload`.

use crate::error::ProtocolError;
use crate::types::{ParticipantKind, ParticipantRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `join` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Must match the room in the connection path when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub participant_id: String,
    #[serde(default)]
    pub display_name: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
}

/// Envelope shared by `offer`, `answer` and `ice-candidate`.
///
/// `from_id` is always set by the relay; any value sent by a client is
/// replaced. A missing `to_id` means "everyone else in the room".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl RelayEnvelope {
    /// Envelope addressed to a single participant.
    #[must_use]
    pub fn targeted(to_id: impl Into<String>, payload: Value) -> Self {
        Self {
            from_id: None,
            to_id: Some(to_id.into()),
            payload,
        }
    }

    /// Envelope for every other participant in the room.
    #[must_use]
    pub fn broadcast(payload: Value) -> Self {
        Self {
            from_id: None,
            to_id: None,
            payload,
        }
    }
}

/// The three negotiation message kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Wire name, also used as a metric label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }

    /// Wraps an envelope in the matching server message.
    #[must_use]
    pub fn into_server_message(self, envelope: RelayEnvelope) -> ServerMessage {
        match self {
            SignalKind::Offer => ServerMessage::Offer(envelope),
            SignalKind::Answer => ServerMessage::Answer(envelope),
            SignalKind::IceCandidate => ServerMessage::IceCandidate(envelope),
        }
    }
}

/// A participant as seen by another participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub participant_id: String,
    #[serde(default)]
    pub display_name: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
    /// Whether the recipient of this record should send the first offer
    /// toward this peer.
    pub should_create_offer: bool,
}

/// Messages sent by participants to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Join(JoinRequest),
    Offer(RelayEnvelope),
    Answer(RelayEnvelope),
    IceCandidate(RelayEnvelope),
    Leave,
    Ping,
    Pong,
}

impl ClientMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if the frame is not a known message.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes the message as a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Splits a negotiation message into its kind and envelope.
    #[must_use]
    pub fn into_signal(self) -> Option<(SignalKind, RelayEnvelope)> {
        match self {
            ClientMessage::Offer(env) => Some((SignalKind::Offer, env)),
            ClientMessage::Answer(env) => Some((SignalKind::Answer, env)),
            ClientMessage::IceCandidate(env) => Some((SignalKind::IceCandidate, env)),
            _ => None,
        }
    }

    /// Wire name, also used as a metric label.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => "join",
            ClientMessage::Offer(_) => "offer",
            ClientMessage::Answer(_) => "answer",
            ClientMessage::IceCandidate(_) => "ice-candidate",
            ClientMessage::Leave => "leave",
            ClientMessage::Ping => "ping",
            ClientMessage::Pong => "pong",
        }
    }
}

/// Messages sent by the relay to participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent to a joiner: every other participant currently in the room.
    PeerDiscovery { participants: Vec<PeerInfo> },
    /// Sent to existing participants when someone joins.
    UserJoined(PeerInfo),
    Offer(RelayEnvelope),
    Answer(RelayEnvelope),
    IceCandidate(RelayEnvelope),
    UserLeft {
        #[serde(rename = "participantId")]
        participant_id: String,
    },
    /// A rejected join.
    Error { code: String, message: String },
    Ping,
    Pong,
}

impl ServerMessage {
    /// Encodes the message as a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if the frame is not a known message.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name, also used as a metric label.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::PeerDiscovery { .. } => "peer-discovery",
            ServerMessage::UserJoined(_) => "user-joined",
            ServerMessage::Offer(_) => "offer",
            ServerMessage::Answer(_) => "answer",
            ServerMessage::IceCandidate(_) => "ice-candidate",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Ping => "ping",
            ServerMessage::Pong => "pong",
        }
    }
}
