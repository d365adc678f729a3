//! Relay scenarios driven through actor handles.
//!
//! Connections are `TestConnection`s, so every frame the relay queues for a
//! participant can be inspected directly.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use common::signaling::{PeerInfo, RelayEnvelope, ServerMessage, SignalKind};
use rc_service::actors::{ActorMetrics, RelayActor, RelayActorHandle};
use rc_service::errors::RcError;
use rc_test_utils::{ai_worker, operator_primary, operator_secondary, TestConnection};
use serde_json::json;

const ROOM: &str = "room-42";

fn spawn_relay() -> RelayActorHandle {
    let (relay, _task) = RelayActor::spawn("rc-test".to_string(), 3, None, ActorMetrics::new());
    relay
}

fn discovered(message: ServerMessage) -> Vec<PeerInfo> {
    match message {
        ServerMessage::PeerDiscovery { participants } => participants,
        other => panic!("expected peer-discovery, got {other:?}"),
    }
}

fn joined(message: ServerMessage) -> PeerInfo {
    match message {
        ServerMessage::UserJoined(peer) => peer,
        other => panic!("expected user-joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_three_party_room_offer_initiators() {
    let relay = spawn_relay();
    let mut alice = TestConnection::new("conn-alice");
    let mut bob = TestConnection::new("conn-bob");
    let mut worker = TestConnection::new("conn-ai");

    relay
        .join(ROOM.to_string(), operator_primary("alice"), alice.handle())
        .await
        .unwrap();
    assert!(discovered(alice.recv().await).is_empty());

    relay
        .join(ROOM.to_string(), operator_secondary("bob"), bob.handle())
        .await
        .unwrap();
    let bob_peers = discovered(bob.recv().await);
    assert_eq!(bob_peers.len(), 1);
    assert_eq!(bob_peers[0].participant_id, "alice");
    // "bob" > "alice": alice initiates between the two humans.
    assert!(!bob_peers[0].should_create_offer);

    let alice_sees_bob = joined(alice.recv().await);
    assert_eq!(alice_sees_bob.participant_id, "bob");
    assert!(alice_sees_bob.should_create_offer);

    relay
        .join(ROOM.to_string(), ai_worker("ai-1"), worker.handle())
        .await
        .unwrap();
    let worker_peers = discovered(worker.recv().await);
    assert_eq!(worker_peers.len(), 2);
    assert!(worker_peers.iter().all(|p| !p.should_create_offer));

    // Both humans initiate toward the worker.
    assert!(joined(alice.recv().await).should_create_offer);
    assert!(joined(bob.recv().await).should_create_offer);

    alice.assert_idle();
    bob.assert_idle();
    worker.assert_idle();
}

#[tokio::test]
async fn test_fourth_participant_rejected() {
    let relay = spawn_relay();
    let mut connections = Vec::new();
    for (id, request) in [
        ("alice", operator_primary("alice")),
        ("bob", operator_secondary("bob")),
        ("ai-1", ai_worker("ai-1")),
    ] {
        let conn = TestConnection::new(format!("conn-{id}"));
        relay
            .join(ROOM.to_string(), request, conn.handle())
            .await
            .unwrap();
        connections.push(conn);
    }

    let mut carol = TestConnection::new("conn-carol");
    let err = relay
        .join(ROOM.to_string(), operator_secondary("carol"), carol.handle())
        .await
        .unwrap_err();
    assert!(matches!(err, RcError::RoomFull(_)));
    carol.assert_idle();

    let snapshot = relay.get_room(ROOM.to_string()).await.unwrap();
    assert_eq!(snapshot.participants.len(), 3);
}

#[tokio::test]
async fn test_targeted_offer_carries_sender() {
    let relay = spawn_relay();
    let mut alice = TestConnection::new("conn-alice");
    let mut bob = TestConnection::new("conn-bob");
    relay
        .join(ROOM.to_string(), operator_primary("alice"), alice.handle())
        .await
        .unwrap();
    relay
        .join(ROOM.to_string(), operator_secondary("bob"), bob.handle())
        .await
        .unwrap();
    alice.recv().await;
    alice.recv().await;
    bob.recv().await;

    // A spoofed fromId is overwritten by the relay.
    let mut envelope = RelayEnvelope::targeted("bob", json!({"sdp": "v=0"}));
    envelope.from_id = Some("mallory".to_string());
    relay
        .route(
            ROOM.to_string(),
            "alice".to_string(),
            "conn-alice".to_string(),
            SignalKind::Offer,
            envelope,
        )
        .await
        .unwrap();

    match bob.recv().await {
        ServerMessage::Offer(envelope) => {
            assert_eq!(envelope.from_id.as_deref(), Some("alice"));
            assert_eq!(envelope.to_id.as_deref(), Some("bob"));
            assert_eq!(envelope.payload, json!({"sdp": "v=0"}));
        }
        other => panic!("expected offer, got {other:?}"),
    }
    alice.assert_idle();
}

#[tokio::test]
async fn test_untargeted_candidate_reaches_everyone_else() {
    let relay = spawn_relay();
    let mut conns = vec![
        TestConnection::new("conn-alice"),
        TestConnection::new("conn-bob"),
        TestConnection::new("conn-ai"),
    ];
    relay
        .join(ROOM.to_string(), operator_primary("alice"), conns[0].handle())
        .await
        .unwrap();
    relay
        .join(ROOM.to_string(), operator_secondary("bob"), conns[1].handle())
        .await
        .unwrap();
    relay
        .join(ROOM.to_string(), ai_worker("ai-1"), conns[2].handle())
        .await
        .unwrap();
    // Drain discovery and announcements.
    for _ in 0..3 {
        conns[0].recv().await;
    }
    for _ in 0..2 {
        conns[1].recv().await;
    }
    conns[2].recv().await;

    relay
        .route(
            ROOM.to_string(),
            "ai-1".to_string(),
            "conn-ai".to_string(),
            SignalKind::IceCandidate,
            RelayEnvelope::broadcast(json!({"candidate": "c1"})),
        )
        .await
        .unwrap();

    for conn in &mut conns[..2] {
        match conn.recv().await {
            ServerMessage::IceCandidate(envelope) => {
                assert_eq!(envelope.from_id.as_deref(), Some("ai-1"));
            }
            other => panic!("expected ice-candidate, got {other:?}"),
        }
    }
    conns[2].assert_idle();
}

#[tokio::test]
async fn test_leave_notifies_remaining_and_removes_empty_room() {
    let relay = spawn_relay();
    let mut alice = TestConnection::new("conn-alice");
    let mut bob = TestConnection::new("conn-bob");
    relay
        .join(ROOM.to_string(), operator_primary("alice"), alice.handle())
        .await
        .unwrap();
    relay
        .join(ROOM.to_string(), operator_secondary("bob"), bob.handle())
        .await
        .unwrap();
    alice.recv().await;
    alice.recv().await;
    bob.recv().await;

    relay
        .leave(ROOM.to_string(), "bob".to_string(), "conn-bob".to_string())
        .await
        .unwrap();
    assert_eq!(
        alice.recv().await,
        ServerMessage::UserLeft {
            participant_id: "bob".to_string()
        }
    );
    assert_eq!(bob.recv_close().await, "left");

    relay
        .leave(ROOM.to_string(), "alice".to_string(), "conn-alice".to_string())
        .await
        .unwrap();
    let err = relay.get_room(ROOM.to_string()).await.unwrap_err();
    assert!(matches!(err, RcError::RoomNotFound(_)));

    let status = relay.get_status().await.unwrap();
    assert_eq!(status.room_count, 0);
    assert_eq!(status.participant_count, 0);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let relay = spawn_relay();
    let mut alice = TestConnection::new("conn-alice");
    let mut bob = TestConnection::new("conn-bob");
    relay
        .join("room-a".to_string(), operator_primary("alice"), alice.handle())
        .await
        .unwrap();
    relay
        .join("room-b".to_string(), operator_primary("bob"), bob.handle())
        .await
        .unwrap();

    assert!(discovered(alice.recv().await).is_empty());
    assert!(discovered(bob.recv().await).is_empty());

    relay
        .route(
            "room-a".to_string(),
            "alice".to_string(),
            "conn-alice".to_string(),
            SignalKind::Offer,
            RelayEnvelope::broadcast(json!({})),
        )
        .await
        .unwrap();
    // Route is fire-and-forget; a status round trip orders after it.
    relay.get_status().await.unwrap();
    bob.assert_idle();
}

#[tokio::test]
async fn test_draining_relay_rejects_joins() {
    let relay = spawn_relay();
    let mut alice = TestConnection::new("conn-alice");
    relay
        .join(ROOM.to_string(), operator_primary("alice"), alice.handle())
        .await
        .unwrap();
    alice.recv().await;

    relay.shutdown().await.unwrap();
    assert_eq!(alice.recv_close().await, "shutdown");

    let bob = TestConnection::new("conn-bob");
    let err = relay
        .join(ROOM.to_string(), operator_secondary("bob"), bob.handle())
        .await
        .unwrap_err();
    assert!(matches!(err, RcError::Draining));
    assert!(relay.get_status().await.unwrap().draining);
}
