//! `ConnectionActor` - per-socket writer for one signaling connection.
//!
//! Each `ConnectionActor`:
//! - Owns the write half of exactly one WebSocket
//! - Serializes `ServerMessage`s into text frames in mailbox order
//! - Closes the socket on request, on cancellation, or when its handle is dropped
//!
//! The relay talks to connections only through [`ConnectionHandle::send`],
//! which never waits: a full or closed mailbox drops the frame.

use crate::errors::RcError;

use super::messages::ConnectionMessage;
use super::metrics::{ActorType, MailboxMonitor};

use common::signaling::ServerMessage;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outbound queue bound per connection.
pub const CONNECTION_CHANNEL_BUFFER: usize = 128;

/// Handle to a `ConnectionActor`.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    sender: mpsc::Sender<ConnectionMessage>,
    cancel_token: CancellationToken,
    connection_id: String,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionHandle {
    /// Creates a handle and the mailbox it feeds, without an actor.
    ///
    /// Used by [`ConnectionActor::spawn`] and by tests that read the mailbox
    /// directly.
    #[must_use]
    pub fn channel(
        connection_id: impl Into<String>,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Receiver<ConnectionMessage>) {
        let connection_id = connection_id.into();
        let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Connection,
            connection_id.clone(),
        ));
        (
            Self {
                sender,
                cancel_token,
                connection_id,
                mailbox,
            },
            receiver,
        )
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Queue a frame for the client without waiting.
    ///
    /// # Errors
    ///
    /// Returns `RcError::DeliveryDropped` if the queue is full or the
    /// connection is gone.
    pub fn send(&self, message: ServerMessage) -> Result<(), RcError> {
        match self.sender.try_send(ConnectionMessage::Send { message }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.mailbox.record_drop();
                Err(RcError::DeliveryDropped(format!(
                    "connection {} queue full",
                    self.connection_id
                )))
            }
            Err(TrySendError::Closed(_)) => Err(RcError::DeliveryDropped(format!(
                "connection {} closed",
                self.connection_id
            ))),
        }
    }

    /// Close the connection after already-queued frames are written.
    ///
    /// Falls back to cancellation when the queue is full.
    pub fn close(&self, reason: &str) {
        let message = ConnectionMessage::Close {
            reason: reason.to_string(),
        };
        if self.sender.try_send(message).is_err() {
            self.cancel_token.cancel();
        }
    }

    /// Cancel the connection actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.sender.is_closed()
    }

    /// Resolves once the connection actor has stopped or was cancelled.
    pub async fn closed(&self) {
        tokio::select! {
            () = self.cancel_token.cancelled() => {}
            () = self.sender.closed() => {}
        }
    }

    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor<S> {
    connection_id: String,
    room_id: String,
    receiver: mpsc::Receiver<ConnectionMessage>,
    /// Child of the server's token.
    cancel_token: CancellationToken,
    /// Write half of the socket, one text frame per item.
    sink: S,
    mailbox: Arc<MailboxMonitor>,
}

impl<S> ConnectionActor<S>
where
    S: Sink<String> + Unpin + Send + 'static,
    S::Error: Display,
{
    /// Spawn a writer for `sink` and return its handle.
    pub fn spawn(
        connection_id: String,
        room_id: String,
        sink: S,
        parent_token: &CancellationToken,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let cancel_token = parent_token.child_token();
        let (handle, receiver) = ConnectionHandle::channel(connection_id.clone(), cancel_token.clone());

        let actor = Self {
            connection_id,
            room_id,
            receiver,
            cancel_token,
            sink,
            mailbox: Arc::clone(&handle.mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.connection", fields(connection_id = %self.connection_id, room_id = %self.room_id))]
    async fn run(mut self) {
        debug!(
            target: "rc.actor.connection",
            connection_id = %self.connection_id,
            "ConnectionActor started"
        );

        let close_reason = loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break "cancelled".to_string(),

                msg = self.receiver.recv() => match msg {
                    Some(ConnectionMessage::Send { message }) => {
                        self.mailbox.observe(self.receiver.len());
                        let written = self.write(&message).await;
                        if !written {
                            break "write failed".to_string();
                        }
                    }
                    Some(ConnectionMessage::Close { reason }) => break reason,
                    None => break "handle dropped".to_string(),
                },
            }
        };

        self.graceful_close(&close_reason).await;

        // Wakes the socket reader, which watches this token.
        self.cancel_token.cancel();

        info!(
            target: "rc.actor.connection",
            connection_id = %self.connection_id,
            room_id = %self.room_id,
            reason = %close_reason,
            messages_processed = self.mailbox.stats().processed,
            messages_dropped = self.mailbox.stats().dropped,
            "ConnectionActor stopped"
        );
    }

    /// Write one frame. Returns false if the socket is unusable.
    async fn write(&mut self, message: &ServerMessage) -> bool {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    target: "rc.actor.connection",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Failed to encode frame"
                );
                return true;
            }
        };

        if let Err(e) = self.sink.send(text).await {
            debug!(
                target: "rc.actor.connection",
                connection_id = %self.connection_id,
                error = %e,
                "Socket write failed"
            );
            return false;
        }
        true
    }

    async fn graceful_close(&mut self, reason: &str) {
        debug!(
            target: "rc.actor.connection",
            connection_id = %self.connection_id,
            reason = %reason,
            "Closing connection"
        );
        let _ = self.sink.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures::channel::mpsc as futures_mpsc;
    use futures::StreamExt;

    fn spawn_test_actor() -> (
        ConnectionHandle,
        JoinHandle<()>,
        futures_mpsc::UnboundedReceiver<String>,
    ) {
        let (sink, frames) = futures_mpsc::unbounded::<String>();
        let root = CancellationToken::new();
        let (handle, task) =
            ConnectionActor::spawn("conn-1".to_string(), "room-1".to_string(), sink, &root);
        (handle, task, frames)
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (handle, _task, mut frames) = spawn_test_actor();

        handle.send(ServerMessage::Ping).unwrap();
        handle
            .send(ServerMessage::UserLeft {
                participant_id: "bob".to_string(),
            })
            .unwrap();

        assert_eq!(frames.next().await.unwrap(), r#"{"type":"ping"}"#);
        let second: serde_json::Value =
            serde_json::from_str(&frames.next().await.unwrap()).unwrap();
        assert_eq!(second["type"], "user-left");
        assert_eq!(second["participantId"], "bob");
    }

    #[tokio::test]
    async fn test_close_flushes_then_closes_sink() {
        let (handle, task, mut frames) = spawn_test_actor();

        handle.send(ServerMessage::Pong).unwrap();
        handle.close("replaced");
        task.await.unwrap();

        assert_eq!(frames.next().await.unwrap(), r#"{"type":"pong"}"#);
        assert!(frames.next().await.is_none());
        assert!(handle.is_closed());
        assert!(handle.send(ServerMessage::Ping).is_err());
    }

    #[tokio::test]
    async fn test_cancel_stops_actor_and_resolves_closed() {
        let (handle, task, _frames) = spawn_test_actor();
        handle.cancel();
        task.await.unwrap();
        handle.closed().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (handle, _receiver) = ConnectionHandle::channel("conn-2", CancellationToken::new());

        for _ in 0..CONNECTION_CHANNEL_BUFFER {
            handle.send(ServerMessage::Ping).unwrap();
        }
        let err = handle.send(ServerMessage::Ping).unwrap_err();
        assert!(matches!(err, RcError::DeliveryDropped(_)));
        assert_eq!(handle.mailbox().stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_delivery_dropped() {
        let (handle, receiver) = ConnectionHandle::channel("conn-3", CancellationToken::new());
        drop(receiver);
        assert!(handle.is_closed());
        let err = handle.send(ServerMessage::Ping).unwrap_err();
        assert!(matches!(err, RcError::DeliveryDropped(_)));
    }
}
