//! In-process actor accounting.
//!
//! Each actor samples its mailbox backlog after every receive. The sample is
//! classified against per-actor bands:
//!
//! | Actor        | Normal  | Elevated  | Critical |
//! |--------------|---------|-----------|----------|
//! | Relay        | ≤ 200   | 201-1000  | > 1000   |
//! | Orchestrator | ≤ 50    | 51-200    | > 200    |
//! | Connection   | ≤ 32    | 33-96     | > 96     |
//!
//! Level changes are logged once per transition, not per message. The
//! singletons also export their backlog as `rc_actor_mailbox_depth`.

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Which actor a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    Relay,
    Orchestrator,
    /// One per signaling socket.
    Connection,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActorType::Relay => "relay",
            ActorType::Orchestrator => "orchestrator",
            ActorType::Connection => "connection",
        }
    }

    #[must_use]
    pub const fn thresholds(self) -> MailboxThresholds {
        match self {
            ActorType::Relay => MailboxThresholds {
                elevated: 200,
                critical: 1000,
            },
            ActorType::Orchestrator => MailboxThresholds {
                elevated: 50,
                critical: 200,
            },
            ActorType::Connection => MailboxThresholds {
                elevated: 32,
                critical: 96,
            },
        }
    }

    /// Per-connection gauges would be one series per socket.
    const fn exports_depth(self) -> bool {
        !matches!(self, ActorType::Connection)
    }
}

/// Backlog above `elevated` is elevated; above `critical` is critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxThresholds {
    pub elevated: usize,
    pub critical: usize,
}

impl MailboxThresholds {
    #[must_use]
    pub const fn classify(self, backlog: usize) -> MailboxLevel {
        if backlog > self.critical {
            MailboxLevel::Critical
        } else if backlog > self.elevated {
            MailboxLevel::Elevated
        } else {
            MailboxLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MailboxLevel {
    Normal = 0,
    Elevated = 1,
    Critical = 2,
}

impl MailboxLevel {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => MailboxLevel::Normal,
            1 => MailboxLevel::Elevated,
            _ => MailboxLevel::Critical,
        }
    }
}

/// Point-in-time view of a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStats {
    pub backlog: usize,
    pub peak_backlog: usize,
    pub processed: u64,
    pub dropped: u64,
}

/// Tracks one actor's mailbox.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// rc id for singletons, connection id otherwise.
    actor_id: String,
    backlog: AtomicUsize,
    peak_backlog: AtomicUsize,
    processed: AtomicU64,
    dropped: AtomicU64,
    level: AtomicU8,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            backlog: AtomicUsize::new(0),
            peak_backlog: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            level: AtomicU8::new(MailboxLevel::Normal as u8),
        }
    }

    /// Count one received message and sample what is still queued behind it.
    pub fn observe(&self, backlog: usize) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.backlog.store(backlog, Ordering::Relaxed);
        self.peak_backlog.fetch_max(backlog, Ordering::Relaxed);

        if self.actor_type.exports_depth() {
            prom::set_actor_mailbox_depth(self.actor_type.as_str(), backlog);
        }

        let level = self.actor_type.thresholds().classify(backlog);
        let previous =
            MailboxLevel::from_u8(self.level.swap(level as u8, Ordering::Relaxed));
        if level == previous {
            return;
        }

        match level {
            MailboxLevel::Critical => warn!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                backlog = backlog,
                "Mailbox backlog critical"
            ),
            MailboxLevel::Elevated if previous < level => debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                backlog = backlog,
                "Mailbox backlog elevated"
            ),
            _ => debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                backlog = backlog,
                "Mailbox backlog recovered"
            ),
        }
    }

    /// Count a message rejected because the mailbox was full.
    pub fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "rc.actor.mailbox",
            actor_type = self.actor_type.as_str(),
            actor_id = %self.actor_id,
            dropped = dropped,
            "Mailbox full, message dropped"
        );
    }

    #[must_use]
    pub fn level(&self) -> MailboxLevel {
        MailboxLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            backlog: self.backlog.load(Ordering::Relaxed),
            peak_backlog: self.peak_backlog.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide counters shared by all actors.
///
/// The relay owns room and participant counts, the orchestrator owns worker
/// counts. Each writer also pushes the new value to the Prometheus gauge.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    rooms: AtomicUsize,
    participants: AtomicUsize,
    connections: AtomicUsize,
    workers: AtomicUsize,
    panics: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_room_counts(&self, rooms: usize, participants: usize) {
        self.rooms.store(rooms, Ordering::Relaxed);
        self.participants.store(participants, Ordering::Relaxed);
        prom::set_rooms_active(rooms);
        prom::set_participants_active(participants);
    }

    /// Workers currently counted against capacity.
    pub fn set_worker_count(&self, workers: usize) {
        self.workers.store(workers, Ordering::Relaxed);
        prom::set_workers_active(workers);
    }

    pub fn connection_opened(&self) {
        let open = self.connections.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_connections_active(open);
    }

    pub fn connection_closed(&self) {
        let before = self
            .connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(1))
            })
            .unwrap_or(0);
        prom::set_connections_active(before.saturating_sub(1));
    }

    /// An actor task ended by panicking.
    pub fn record_panic(&self, actor_type: ActorType) {
        let total = self.panics.fetch_add(1, Ordering::Relaxed) + 1;
        prom::record_actor_panic(actor_type.as_str());
        error!(
            target: "rc.actor.panic",
            actor_type = actor_type.as_str(),
            total_panics = total,
            "Actor task panicked"
        );
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}
