//! `RelayActor` - singleton owner of all signaling rooms.
//!
//! The relay:
//! - Admits participants into rooms (bounded per room) and answers with a
//!   peer-discovery list
//! - Announces joins and leaves to the rest of the room
//! - Forwards offer/answer/ICE messages, targeted or broadcast
//! - Keeps the orchestrator's view of room occupancy current
//!
//! Every frame goes out through a [`ConnectionHandle`] that never blocks, so
//! a slow client can only lose its own frames.

use crate::errors::RcError;
use crate::observability::metrics as prom;
use crate::worker::launch::validate_identifier;

use super::connection::ConnectionHandle;
use super::messages::{RelayMessage, RelayStatus, RoomSnapshot};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::orchestrator::OrchestratorHandle;
use super::registry::{Participant, RoomRegistry};

use chrono::Utc;
use common::signaling::{JoinRequest, PeerInfo, RelayEnvelope, ServerMessage, SignalKind};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the relay mailbox.
const RELAY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RelayActor`.
#[derive(Clone, Debug)]
pub struct RelayActorHandle {
    sender: mpsc::Sender<RelayMessage>,
    cancel_token: CancellationToken,
}

impl RelayActorHandle {
    /// Admit a participant into `room_id`.
    ///
    /// On success the peer-discovery frame is already queued on `connection`
    /// and the returned list is the one it carries.
    ///
    /// # Errors
    ///
    /// `RoomFull`, `Draining`, `InvalidMessage` for a bad identifier, or
    /// `Internal` if the relay is gone.
    pub async fn join(
        &self,
        room_id: String,
        request: JoinRequest,
        connection: ConnectionHandle,
    ) -> Result<Vec<PeerInfo>, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Join {
                room_id,
                request,
                connection,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Forward a negotiation message. Delivery problems are handled inside
    /// the relay and never reported back.
    pub async fn route(
        &self,
        room_id: String,
        from_id: String,
        connection_id: String,
        kind: SignalKind,
        envelope: RelayEnvelope,
    ) -> Result<(), RcError> {
        self.sender
            .send(RelayMessage::Route {
                room_id,
                from_id,
                connection_id,
                kind,
                envelope,
                received_at: Instant::now(),
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    /// Remove a participant if `connection_id` still owns its entry.
    pub async fn leave(
        &self,
        room_id: String,
        participant_id: String,
        connection_id: String,
    ) -> Result<(), RcError> {
        self.sender
            .send(RelayMessage::Leave {
                room_id,
                participant_id,
                connection_id,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    /// Snapshot of a room's participants.
    pub async fn get_room(&self, room_id: String) -> Result<RoomSnapshot, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::GetRoom {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    pub async fn get_status(&self) -> Result<RelayStatus, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Stop admitting participants and close every connection.
    pub async fn shutdown(&self) -> Result<(), RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Child token for connection actors.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `RelayActor` implementation.
pub struct RelayActor {
    rc_id: String,
    receiver: mpsc::Receiver<RelayMessage>,
    cancel_token: CancellationToken,
    rooms: RoomRegistry,
    max_participants_per_room: usize,
    /// Receives occupancy updates. `None` runs the relay standalone.
    orchestrator: Option<OrchestratorHandle>,
    accepting_new: bool,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RelayActor {
    /// Spawn the relay and return its handle.
    #[must_use]
    pub fn spawn(
        rc_id: String,
        max_participants_per_room: usize,
        orchestrator: Option<OrchestratorHandle>,
        metrics: Arc<ActorMetrics>,
    ) -> (RelayActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(RELAY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();
        let mailbox = MailboxMonitor::new(ActorType::Relay, rc_id.clone());

        let actor = Self {
            rc_id,
            receiver,
            cancel_token: cancel_token.clone(),
            rooms: RoomRegistry::new(),
            max_participants_per_room,
            orchestrator,
            accepting_new: true,
            metrics,
            mailbox,
        };

        let task_handle = tokio::spawn(actor.run());

        (
            RelayActorHandle {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.relay", fields(rc_id = %self.rc_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.relay",
            rc_id = %self.rc_id,
            max_participants_per_room = self.max_participants_per_room,
            "RelayActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.relay",
                        rc_id = %self.rc_id,
                        "RelayActor received cancellation signal"
                    );
                    self.close_all("shutdown");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.observe(self.receiver.len());
                            self.handle_message(message).await;
                        }
                        None => {
                            info!(
                                target: "rc.actor.relay",
                                rc_id = %self.rc_id,
                                "RelayActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.relay",
            rc_id = %self.rc_id,
            rooms_remaining = self.rooms.room_count(),
            messages_processed = self.mailbox.stats().processed,
            "RelayActor stopped"
        );
    }

    async fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::Join {
                room_id,
                request,
                connection,
                respond_to,
            } => {
                let result = self.handle_join(&room_id, request, connection).await;
                let _ = respond_to.send(result);
            }

            RelayMessage::Route {
                room_id,
                from_id,
                connection_id,
                kind,
                envelope,
                received_at,
            } => {
                if let Err(e) = self.handle_route(&room_id, &from_id, &connection_id, kind, envelope)
                {
                    debug!(
                        target: "rc.actor.relay",
                        room_id = %room_id,
                        from_id = %from_id,
                        message_type = kind.as_str(),
                        error = %e,
                        "Signaling message dropped"
                    );
                    prom::record_signaling_dropped(e.error_type());
                }
                prom::record_message_latency(kind.as_str(), received_at.elapsed());
            }

            RelayMessage::Leave {
                room_id,
                participant_id,
                connection_id,
            } => {
                self.handle_leave(&room_id, &participant_id, &connection_id)
                    .await;
            }

            RelayMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let result = self
                    .rooms
                    .get(&room_id)
                    .map(super::registry::Room::snapshot)
                    .ok_or(RcError::RoomNotFound(room_id));
                let _ = respond_to.send(result);
            }

            RelayMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(RelayStatus {
                    room_count: self.rooms.room_count(),
                    participant_count: self.rooms.participant_count(),
                    draining: !self.accepting_new,
                });
            }

            RelayMessage::Shutdown { respond_to } => {
                self.accepting_new = false;
                self.close_all("shutdown");
                let _ = respond_to.send(());
            }
        }
    }

    async fn handle_join(
        &mut self,
        room_id: &str,
        request: JoinRequest,
        connection: ConnectionHandle,
    ) -> Result<Vec<PeerInfo>, RcError> {
        if !self.accepting_new {
            return Err(RcError::Draining);
        }
        validate_identifier("participant id", &request.participant_id)
            .map_err(|e| RcError::InvalidMessage(e.to_string()))?;

        let room = self.rooms.get_or_create(room_id);
        if !room.contains(&request.participant_id) && room.len() >= self.max_participants_per_room
        {
            let capacity = room.len();
            self.rooms.remove_if_empty(room_id);
            warn!(
                target: "rc.actor.relay",
                room_id = %room_id,
                participant_id = %request.participant_id,
                participants = capacity,
                "Room full, join rejected"
            );
            return Err(RcError::RoomFull(room_id.to_string()));
        }

        let participant = Participant {
            participant_id: request.participant_id,
            display_name: request.display_name,
            role: request.role,
            kind: request.kind,
            connection,
            joined_at: Utc::now(),
        };

        let peers = room.peers_for(&participant);

        // Discovery first, so no peer offer can reach the joiner before it.
        if let Err(e) = participant.connection.send(ServerMessage::PeerDiscovery {
            participants: peers.clone(),
        }) {
            prom::record_signaling_dropped(e.error_type());
        }

        for existing in room.others(&participant.participant_id) {
            let announce = ServerMessage::UserJoined(participant.peer_info_for(existing));
            if let Err(e) = existing.connection.send(announce) {
                debug!(
                    target: "rc.actor.relay",
                    room_id = %room_id,
                    to_id = %existing.participant_id,
                    error = %e,
                    "user-joined not delivered"
                );
                prom::record_signaling_dropped(e.error_type());
            }
        }

        let participant_id = participant.participant_id.clone();
        let role = participant.role;
        let kind = participant.kind;
        let new_connection_id = participant.connection.connection_id().to_string();

        if let Some(replaced) = room.insert(participant) {
            if replaced.connection.connection_id() != new_connection_id {
                replaced.connection.close("replaced");
            }
            info!(
                target: "rc.actor.relay",
                room_id = %room_id,
                participant_id = %participant_id,
                "Participant re-joined, previous connection replaced"
            );
        } else {
            info!(
                target: "rc.actor.relay",
                room_id = %room_id,
                participant_id = %participant_id,
                role = %role,
                peers = peers.len(),
                "Participant joined"
            );
        }

        prom::record_signaling_message("join");
        self.publish_counts();

        if let Some(orchestrator) = &self.orchestrator {
            if let Err(e) = orchestrator
                .participant_joined(room_id.to_string(), participant_id, role, kind)
                .await
            {
                warn!(target: "rc.actor.relay", error = %e, "Failed to notify orchestrator of join");
            }
        }

        Ok(peers)
    }

    fn handle_route(
        &self,
        room_id: &str,
        from_id: &str,
        connection_id: &str,
        kind: SignalKind,
        mut envelope: RelayEnvelope,
    ) -> Result<(), RcError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RcError::InvalidMessage(format!("unknown room {room_id}")))?;

        let is_member = room
            .get(from_id)
            .is_some_and(|p| p.connection.connection_id() == connection_id);
        if !is_member {
            return Err(RcError::InvalidMessage(format!(
                "{from_id} is not a member of {room_id}"
            )));
        }

        envelope.from_id = Some(from_id.to_string());
        prom::record_signaling_message(kind.as_str());

        match envelope.to_id.clone() {
            Some(to_id) if to_id == from_id => Err(RcError::InvalidMessage(
                "message addressed to its sender".to_string(),
            )),
            Some(to_id) => {
                let target = room
                    .get(&to_id)
                    .ok_or_else(|| RcError::DeliveryDropped(format!("unknown target {to_id}")))?;
                target.connection.send(kind.into_server_message(envelope))
            }
            None => {
                for peer in room.others(from_id) {
                    if let Err(e) = peer
                        .connection
                        .send(kind.into_server_message(envelope.clone()))
                    {
                        prom::record_signaling_dropped(e.error_type());
                    }
                }
                Ok(())
            }
        }
    }

    async fn handle_leave(&mut self, room_id: &str, participant_id: &str, connection_id: &str) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };

        let Some(departed) = room.remove_if_connection(participant_id, connection_id) else {
            debug!(
                target: "rc.actor.relay",
                room_id = %room_id,
                participant_id = %participant_id,
                connection_id = %connection_id,
                "Ignoring leave from replaced connection"
            );
            return;
        };

        for peer in room.others(participant_id) {
            let notice = ServerMessage::UserLeft {
                participant_id: participant_id.to_string(),
            };
            if let Err(e) = peer.connection.send(notice) {
                prom::record_signaling_dropped(e.error_type());
            }
        }

        let remaining = room.len();
        let room_removed = self.rooms.remove_if_empty(room_id);
        departed.connection.close("left");

        info!(
            target: "rc.actor.relay",
            room_id = %room_id,
            participant_id = %participant_id,
            remaining = remaining,
            room_removed = room_removed,
            "Participant left"
        );

        prom::record_signaling_message("leave");
        self.publish_counts();

        if let Some(orchestrator) = &self.orchestrator {
            if let Err(e) = orchestrator
                .participant_left(room_id.to_string(), participant_id.to_string())
                .await
            {
                warn!(target: "rc.actor.relay", error = %e, "Failed to notify orchestrator of leave");
            }
        }
    }

    /// Close every connection and forget all rooms.
    fn close_all(&mut self, reason: &str) {
        let mut closed = 0usize;
        for room in self.rooms.rooms_mut() {
            for participant in room.drain() {
                participant.connection.close(reason);
                closed += 1;
            }
        }
        self.rooms.clear();
        self.publish_counts();

        if closed > 0 {
            info!(
                target: "rc.actor.relay",
                rc_id = %self.rc_id,
                closed = closed,
                "Closed all signaling connections"
            );
        }
    }

    fn publish_counts(&self) {
        self.metrics
            .set_room_counts(self.rooms.room_count(), self.rooms.participant_count());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actors::messages::ConnectionMessage;
    use common::types::{ParticipantKind, ParticipantRole};
    use serde_json::json;

    struct Peer {
        id: String,
        handle: ConnectionHandle,
        inbox: mpsc::Receiver<ConnectionMessage>,
    }

    impl Peer {
        fn new(id: &str, connection_id: &str) -> Self {
            let (handle, inbox) = ConnectionHandle::channel(connection_id, CancellationToken::new());
            Self {
                id: id.to_string(),
                handle,
                inbox,
            }
        }

        fn request(&self, role: ParticipantRole, kind: ParticipantKind) -> JoinRequest {
            JoinRequest {
                room_id: None,
                participant_id: self.id.clone(),
                display_name: self.id.clone(),
                role,
                kind,
            }
        }

        fn next(&mut self) -> Option<ServerMessage> {
            match self.inbox.try_recv().ok()? {
                ConnectionMessage::Send { message } => Some(message),
                ConnectionMessage::Close { .. } => None,
            }
        }

        fn next_close(&mut self) -> Option<String> {
            while let Ok(message) = self.inbox.try_recv() {
                if let ConnectionMessage::Close { reason } = message {
                    return Some(reason);
                }
            }
            None
        }
    }

    fn spawn_relay(max: usize) -> RelayActorHandle {
        let (handle, _task) = RelayActor::spawn("rc-test".to_string(), max, None, ActorMetrics::new());
        handle
    }

    async fn join_human(relay: &RelayActorHandle, peer: &Peer) -> Vec<PeerInfo> {
        relay
            .join(
                "room-1".to_string(),
                peer.request(ParticipantRole::OperatorPrimary, ParticipantKind::Human),
                peer.handle.clone(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_join_returns_others_and_announces() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        let mut bob = Peer::new("bob", "c-bob");

        assert!(join_human(&relay, &alice).await.is_empty());
        let peers = join_human(&relay, &bob).await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].participant_id, "alice");
        assert!(!peers[0].should_create_offer, "bob waits for alice");

        assert_eq!(
            alice.next(),
            Some(ServerMessage::PeerDiscovery {
                participants: vec![]
            })
        );
        match alice.next() {
            Some(ServerMessage::UserJoined(info)) => {
                assert_eq!(info.participant_id, "bob");
                assert!(info.should_create_offer, "alice initiates toward bob");
            }
            other => panic!("expected user-joined, got {other:?}"),
        }
        assert!(matches!(bob.next(), Some(ServerMessage::PeerDiscovery { .. })));
    }

    #[tokio::test]
    async fn test_room_full_rejects_fourth() {
        let relay = spawn_relay(3);
        let peers: Vec<Peer> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Peer::new(id, &format!("c-{id}")))
            .collect();

        for peer in &peers[..3] {
            join_human(&relay, peer).await;
        }
        let err = relay
            .join(
                "room-1".to_string(),
                peers[3].request(ParticipantRole::OperatorSecondary, ParticipantKind::Human),
                peers[3].handle.clone(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RcError::RoomFull(_)));

        // A re-join of a member is an overwrite, not a fourth participant.
        let again = Peer::new("a", "c-a2");
        assert_eq!(join_human(&relay, &again).await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_participant_id_rejected() {
        let relay = spawn_relay(3);
        let peer = Peer::new("bad id", "c-bad");
        let err = relay
            .join(
                "room-1".to_string(),
                peer.request(ParticipantRole::OperatorPrimary, ParticipantKind::Human),
                peer.handle.clone(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RcError::InvalidMessage(_)));
        assert_eq!(relay.get_status().await.unwrap().room_count, 0);
    }

    #[tokio::test]
    async fn test_targeted_and_broadcast_routing() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        let mut bob = Peer::new("bob", "c-bob");
        let mut carol = Peer::new("carol", "c-carol");
        for peer in [&alice, &bob, &carol] {
            join_human(&relay, peer).await;
        }
        while alice.next().is_some() {}
        while bob.next().is_some() {}
        while carol.next().is_some() {}

        let mut envelope = RelayEnvelope::targeted("bob", json!({"sdp": "v=0"}));
        envelope.from_id = Some("mallory".to_string());
        relay
            .route(
                "room-1".to_string(),
                "alice".to_string(),
                "c-alice".to_string(),
                SignalKind::Offer,
                envelope,
            )
            .await
            .unwrap();
        relay
            .route(
                "room-1".to_string(),
                "carol".to_string(),
                "c-carol".to_string(),
                SignalKind::IceCandidate,
                RelayEnvelope::broadcast(json!({"candidate": "x"})),
            )
            .await
            .unwrap();
        relay.get_status().await.unwrap();

        match bob.next() {
            Some(ServerMessage::Offer(env)) => {
                assert_eq!(env.from_id.as_deref(), Some("alice"));
                assert_eq!(env.payload["sdp"], "v=0");
            }
            other => panic!("expected offer, got {other:?}"),
        }
        assert!(matches!(bob.next(), Some(ServerMessage::IceCandidate(_))));
        assert!(bob.next().is_none());

        assert!(matches!(alice.next(), Some(ServerMessage::IceCandidate(_))));
        assert!(alice.next().is_none());
        assert!(carol.next().is_none());
    }

    #[tokio::test]
    async fn test_unknown_target_and_non_member_are_dropped() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        join_human(&relay, &alice).await;
        alice.next();

        relay
            .route(
                "room-1".to_string(),
                "alice".to_string(),
                "c-alice".to_string(),
                SignalKind::Offer,
                RelayEnvelope::targeted("ghost", json!({})),
            )
            .await
            .unwrap();
        relay
            .route(
                "room-1".to_string(),
                "eve".to_string(),
                "c-eve".to_string(),
                SignalKind::Offer,
                RelayEnvelope::targeted("alice", json!({})),
            )
            .await
            .unwrap();
        relay.get_status().await.unwrap();

        assert!(alice.next().is_none());
    }

    #[tokio::test]
    async fn test_leave_notifies_and_removes_empty_room() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        let bob = Peer::new("bob", "c-bob");
        join_human(&relay, &alice).await;
        join_human(&relay, &bob).await;
        while alice.next().is_some() {}

        relay
            .leave("room-1".to_string(), "bob".to_string(), "c-bob".to_string())
            .await
            .unwrap();
        let snapshot = relay.get_room("room-1".to_string()).await.unwrap();
        assert_eq!(snapshot.participants.len(), 1);
        assert_eq!(
            alice.next(),
            Some(ServerMessage::UserLeft {
                participant_id: "bob".to_string()
            })
        );

        relay
            .leave("room-1".to_string(), "alice".to_string(), "c-alice".to_string())
            .await
            .unwrap();
        let err = relay.get_room("room-1".to_string()).await.unwrap_err();
        assert!(matches!(err, RcError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_rejoin_replaces_connection_and_ignores_stale_leave() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        let mut old_bob = Peer::new("bob", "c-bob-1");
        let new_bob = Peer::new("bob", "c-bob-2");
        join_human(&relay, &alice).await;
        join_human(&relay, &old_bob).await;
        while alice.next().is_some() {}

        join_human(&relay, &new_bob).await;
        assert_eq!(old_bob.next_close().as_deref(), Some("replaced"));
        assert!(matches!(alice.next(), Some(ServerMessage::UserJoined(_))));

        relay
            .leave("room-1".to_string(), "bob".to_string(), "c-bob-1".to_string())
            .await
            .unwrap();
        let snapshot = relay.get_room("room-1".to_string()).await.unwrap();
        assert_eq!(snapshot.participants.len(), 2);
        assert!(alice.next().is_none(), "no user-left for a replaced connection");
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections_and_rejects_joins() {
        let relay = spawn_relay(3);
        let mut alice = Peer::new("alice", "c-alice");
        join_human(&relay, &alice).await;

        relay.shutdown().await.unwrap();
        assert_eq!(alice.next_close().as_deref(), Some("shutdown"));

        let bob = Peer::new("bob", "c-bob");
        let err = relay
            .join(
                "room-1".to_string(),
                bob.request(ParticipantRole::OperatorPrimary, ParticipantKind::Human),
                bob.handle.clone(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RcError::Draining));

        let status = relay.get_status().await.unwrap();
        assert!(status.draining);
        assert_eq!(status.participant_count, 0);
    }
}
