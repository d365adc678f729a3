//! Signaling connection stand-in for relay tests.
//!
//! Wraps a [`ConnectionHandle`] without a socket behind it, so tests read
//! exactly what the relay queued for a participant.

use common::signaling::ServerMessage;
use rc_service::actors::{ConnectionHandle, ConnectionMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long `recv` waits before failing the test.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct TestConnection {
    handle: ConnectionHandle,
    receiver: mpsc::Receiver<ConnectionMessage>,
}

impl TestConnection {
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        let (handle, receiver) = ConnectionHandle::channel(connection_id, CancellationToken::new());
        Self { handle, receiver }
    }

    /// Connection with a random id.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("conn-{}", uuid::Uuid::new_v4()))
    }

    /// Handle to pass to the relay.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        self.handle.connection_id()
    }

    /// Next outbound frame.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if the relay closed the connection instead.
    pub async fn recv(&mut self) -> ServerMessage {
        match tokio::time::timeout(RECV_TIMEOUT, self.receiver.recv()).await {
            Ok(Some(ConnectionMessage::Send { message })) => message,
            Ok(Some(ConnectionMessage::Close { reason })) => {
                panic!("expected a frame, connection closed: {reason}")
            }
            Ok(None) => panic!("expected a frame, mailbox closed"),
            Err(_) => panic!("no frame within {RECV_TIMEOUT:?}"),
        }
    }

    /// Waits for the relay to close this connection and returns the reason.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if a frame arrives first.
    pub async fn recv_close(&mut self) -> String {
        match tokio::time::timeout(RECV_TIMEOUT, self.receiver.recv()).await {
            Ok(Some(ConnectionMessage::Close { reason })) => reason,
            Ok(Some(ConnectionMessage::Send { message })) => {
                panic!("expected close, got frame: {message:?}")
            }
            Ok(None) => panic!("expected close, mailbox closed"),
            Err(_) => panic!("no close within {RECV_TIMEOUT:?}"),
        }
    }

    /// Asserts nothing is queued.
    ///
    /// # Panics
    ///
    /// Panics if a message is waiting.
    pub fn assert_idle(&mut self) {
        if let Ok(message) = self.receiver.try_recv() {
            panic!("expected no queued messages, found {message:?}");
        }
    }
}
