//! End-to-end signaling over real WebSocket connections.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::signaling::{ClientMessage, RelayEnvelope, ServerMessage};
use futures::{SinkExt, StreamExt};
use rc_service::actors::{ActorMetrics, OrchestratorActor, RelayActor};
use rc_service::routes::{build_routes, AppState};
use rc_test_utils::{operator_primary, operator_secondary, test_settings, MockLauncher};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let metrics = ActorMetrics::new();
    let (orchestrator, _) = OrchestratorActor::spawn(
        "rc-test".to_string(),
        test_settings(),
        MockLauncher::new(),
        Arc::clone(&metrics),
    );
    let (relay, _) = RelayActor::spawn(
        "rc-test".to_string(),
        3,
        Some(orchestrator.clone()),
        Arc::clone(&metrics),
    );
    let app = build_routes(Arc::new(AppState {
        relay,
        orchestrator,
        metrics,
        ping_interval: Duration::from_secs(25),
    }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, room_id: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws/{room_id}"))
        .await
        .expect("Failed to connect");
    client
}

async fn send(client: &mut Client, message: &ClientMessage) {
    client
        .send(Message::Text(message.encode().unwrap()))
        .await
        .unwrap();
}

/// Next signaling frame, skipping keepalive pings.
async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, client.next())
            .await
            .expect("no frame received")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            let message = ServerMessage::decode(&text).unwrap();
            if message != ServerMessage::Ping {
                return message;
            }
        }
    }
}

#[tokio::test]
async fn test_join_offer_and_disconnect() {
    let addr = start_server().await;
    let mut alice = connect(addr, "room-1").await;
    let mut bob = connect(addr, "room-1").await;

    // Raw frame to pin the wire format.
    alice
        .send(Message::Text(
            json!({
                "type": "join",
                "participantId": "alice",
                "displayName": "Alice",
                "role": "operator-primary",
                "kind": "human"
            })
            .to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(
        recv(&mut alice).await,
        ServerMessage::PeerDiscovery {
            participants: vec![]
        }
    );

    send(&mut bob, &ClientMessage::Join(operator_secondary("bob"))).await;
    match recv(&mut bob).await {
        ServerMessage::PeerDiscovery { participants } => {
            assert_eq!(participants.len(), 1);
            assert_eq!(participants[0].participant_id, "alice");
            assert_eq!(participants[0].display_name, "Alice");
        }
        other => panic!("expected peer-discovery, got {other:?}"),
    }
    match recv(&mut alice).await {
        ServerMessage::UserJoined(peer) => {
            assert_eq!(peer.participant_id, "bob");
            assert!(peer.should_create_offer);
        }
        other => panic!("expected user-joined, got {other:?}"),
    }

    send(
        &mut alice,
        &ClientMessage::Offer(RelayEnvelope::targeted("bob", json!({"sdp": "v=0"}))),
    )
    .await;
    match recv(&mut bob).await {
        ServerMessage::Offer(envelope) => {
            assert_eq!(envelope.from_id.as_deref(), Some("alice"));
            assert_eq!(envelope.payload, json!({"sdp": "v=0"}));
        }
        other => panic!("expected offer, got {other:?}"),
    }

    // Dropping the socket counts as leaving.
    bob.close(None).await.unwrap();
    assert_eq!(
        recv(&mut alice).await,
        ServerMessage::UserLeft {
            participant_id: "bob".to_string()
        }
    );
}

#[tokio::test]
async fn test_join_for_other_room_is_rejected() {
    let addr = start_server().await;
    let mut client = connect(addr, "room-1").await;

    let mut request = operator_primary("alice");
    request.room_id = Some("room-2".to_string());
    send(&mut client, &ClientMessage::Join(request)).await;

    match recv(&mut client).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "ROOM_MISMATCH"),
        other => panic!("expected error, got {other:?}"),
    }

    // The connection is still usable for a correct join.
    send(&mut client, &ClientMessage::Join(operator_primary("alice"))).await;
    assert!(matches!(
        recv(&mut client).await,
        ServerMessage::PeerDiscovery { .. }
    ));
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let addr = start_server().await;
    let mut client = connect(addr, "room-1").await;

    client
        .send(Message::Text("{not json".to_string()))
        .await
        .unwrap();
    client
        .send(Message::Text(json!({"type": "teleport"}).to_string()))
        .await
        .unwrap();
    // Signaling before joining is dropped as well.
    send(
        &mut client,
        &ClientMessage::Offer(RelayEnvelope::broadcast(json!({}))),
    )
    .await;

    send(&mut client, &ClientMessage::Ping).await;
    assert_eq!(recv(&mut client).await, ServerMessage::Pong);
}

#[tokio::test]
async fn test_fourth_socket_gets_room_full() {
    let addr = start_server().await;
    let mut clients = Vec::new();
    for id in ["p1", "p2", "p3"] {
        let mut client = connect(addr, "room-1").await;
        send(&mut client, &ClientMessage::Join(operator_secondary(id))).await;
        assert!(matches!(
            recv(&mut client).await,
            ServerMessage::PeerDiscovery { .. }
        ));
        clients.push(client);
    }

    let mut late = connect(addr, "room-1").await;
    send(&mut late, &ClientMessage::Join(operator_secondary("p4"))).await;
    match recv(&mut late).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, "ROOM_FULL"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_room_id_is_not_upgraded() {
    let addr = start_server().await;
    let result = connect_async(format!("ws://{addr}/ws/room%20one")).await;
    assert!(result.is_err());
}
