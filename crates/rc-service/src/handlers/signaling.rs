//! Signaling WebSocket handler.
//!
//! `GET /ws/{room_id}` upgrades to a WebSocket speaking the JSON signaling
//! protocol. The socket's write half goes to a `ConnectionActor`; this task
//! keeps the read half and drives the per-connection state machine:
//!
//! ```text
//! Connecting --join--> Joined --offer/answer/ice--> Signaling
//!      \                  \                            \
//!       `------------------`----- leave / close --------`--> Left
//! ```
//!
//! Malformed and out-of-state messages are logged and dropped. Only a
//! rejected `join` is answered, with an `error` frame.

use crate::actors::{ConnectionActor, ConnectionHandle, RelayActorHandle};
use crate::errors::RcError;
use crate::observability::metrics as prom;
use crate::routes::AppState;
use crate::worker::launch::validate_identifier;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use common::signaling::{ClientMessage, JoinRequest, ServerMessage};
use futures::{future, SinkExt, StreamExt};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Largest accepted frame and message.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Error code for a join naming a different room than the socket path.
const ROOM_MISMATCH: &str = "ROOM_MISMATCH";

/// Handler for GET /ws/{room_id}
///
/// # Response
///
/// - 101 Switching Protocols: signaling session
/// - 400 Bad Request: invalid room id
pub async fn signaling_ws(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, RcError> {
    validate_identifier("room id", &room_id).map_err(|e| RcError::InvalidMessage(e.to_string()))?;

    Ok(ws
        .max_frame_size(MAX_FRAME_BYTES)
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| run_connection(state, room_id, socket)))
}

/// Where a signaling connection is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionState {
    Connecting,
    Joined { participant_id: String },
    Signaling { participant_id: String },
    Left,
}

impl ConnectionState {
    fn participant_id(&self) -> Option<&str> {
        match self {
            ConnectionState::Joined { participant_id }
            | ConnectionState::Signaling { participant_id } => Some(participant_id),
            ConnectionState::Connecting | ConnectionState::Left => None,
        }
    }
}

struct SignalingSession {
    room_id: String,
    connection_id: String,
    connection: ConnectionHandle,
    relay: RelayActorHandle,
    state: ConnectionState,
}

async fn run_connection(state: Arc<AppState>, room_id: String, socket: WebSocket) {
    let connection_id = Uuid::new_v4().to_string();
    let (sink, mut stream) = socket.split();
    let sink = sink.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));

    let (connection, _writer) = ConnectionActor::spawn(
        connection_id.clone(),
        room_id.clone(),
        sink,
        &state.relay.child_token(),
    );
    state.metrics.connection_opened();

    debug!(
        target: "rc.signaling",
        room_id = %room_id,
        connection_id = %connection_id,
        "Signaling connection opened"
    );

    let mut session = SignalingSession {
        room_id,
        connection_id,
        connection,
        relay: state.relay.clone(),
        state: ConnectionState::Connecting,
    };

    let period = state.ping_interval;
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = session.connection.closed() => break,

            _ = ping.tick() => {
                if session.connection.send(ServerMessage::Ping).is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                let flow = match frame {
                    Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                    Some(Ok(Message::Binary(_))) => {
                        debug!(
                            target: "rc.signaling",
                            connection_id = %session.connection_id,
                            "Binary frame dropped"
                        );
                        prom::record_signaling_dropped("unsupported_frame");
                        ControlFlow::Continue(())
                    }
                    // Protocol-level ping/pong is answered by the socket itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => ControlFlow::Continue(()),
                    Some(Ok(Message::Close(_)) | Err(_)) | None => ControlFlow::Break(()),
                };
                if flow.is_break() {
                    break;
                }
            }
        }
    }

    session.finish().await;
    state.metrics.connection_closed();
}

impl SignalingSession {
    async fn handle_text(&mut self, text: &str) -> ControlFlow<()> {
        let message = match ClientMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(
                    target: "rc.signaling",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Malformed signaling message dropped"
                );
                prom::record_signaling_dropped("invalid_message");
                return ControlFlow::Continue(());
            }
        };

        match message {
            ClientMessage::Ping => {
                let _ = self.connection.send(ServerMessage::Pong);
                ControlFlow::Continue(())
            }
            ClientMessage::Pong => ControlFlow::Continue(()),
            ClientMessage::Join(request) => self.handle_join(request).await,
            ClientMessage::Leave => ControlFlow::Break(()),
            other => self.handle_signal(other).await,
        }
    }

    async fn handle_join(&mut self, request: JoinRequest) -> ControlFlow<()> {
        if self.state != ConnectionState::Connecting {
            debug!(
                target: "rc.signaling",
                connection_id = %self.connection_id,
                "Duplicate join dropped"
            );
            return ControlFlow::Continue(());
        }

        if request
            .room_id
            .as_deref()
            .is_some_and(|requested| requested != self.room_id)
        {
            self.reject(ROOM_MISMATCH, "Join names a different room than the connection");
            return ControlFlow::Continue(());
        }

        let participant_id = request.participant_id.clone();
        match self
            .relay
            .join(self.room_id.clone(), request, self.connection.clone())
            .await
        {
            Ok(peers) => {
                info!(
                    target: "rc.signaling",
                    room_id = %self.room_id,
                    participant_id = %participant_id,
                    peers = peers.len(),
                    "Joined room"
                );
                self.state = ConnectionState::Joined { participant_id };
                ControlFlow::Continue(())
            }
            Err(e @ RcError::Internal(_)) => {
                warn!(target: "rc.signaling", error = %e, "Relay unavailable");
                self.reject(e.error_code(), &e.client_message());
                ControlFlow::Break(())
            }
            Err(e) => {
                self.reject(e.error_code(), &e.client_message());
                ControlFlow::Continue(())
            }
        }
    }

    async fn handle_signal(&mut self, message: ClientMessage) -> ControlFlow<()> {
        let message_type = message.message_type();
        let Some(participant_id) = self.state.participant_id().map(str::to_string) else {
            debug!(
                target: "rc.signaling",
                connection_id = %self.connection_id,
                message_type = message_type,
                "Signaling before join dropped"
            );
            prom::record_signaling_dropped("not_joined");
            return ControlFlow::Continue(());
        };
        let Some((kind, envelope)) = message.into_signal() else {
            return ControlFlow::Continue(());
        };

        if let Err(e) = self
            .relay
            .route(
                self.room_id.clone(),
                participant_id.clone(),
                self.connection_id.clone(),
                kind,
                envelope,
            )
            .await
        {
            warn!(target: "rc.signaling", error = %e, "Relay unavailable");
            return ControlFlow::Break(());
        }

        self.state = ConnectionState::Signaling { participant_id };
        ControlFlow::Continue(())
    }

    fn reject(&self, code: &str, message: &str) {
        debug!(
            target: "rc.signaling",
            room_id = %self.room_id,
            connection_id = %self.connection_id,
            code = code,
            "Join rejected"
        );
        let _ = self.connection.send(ServerMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Leave the room (if joined) and close the socket.
    async fn finish(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Left);
        if let Some(participant_id) = previous.participant_id() {
            if let Err(e) = self
                .relay
                .leave(
                    self.room_id.clone(),
                    participant_id.to_string(),
                    self.connection_id.clone(),
                )
                .await
            {
                debug!(target: "rc.signaling", error = %e, "Leave not delivered");
            }
        }
        self.connection.close("disconnected");

        debug!(
            target: "rc.signaling",
            room_id = %self.room_id,
            connection_id = %self.connection_id,
            "Signaling connection closed"
        );
    }
}
