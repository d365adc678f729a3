//! Actor model implementation for the Room Controller.
//!
//! ```text
//! RelayActor (singleton)
//! ├── owns every room and its participants
//! ├── writes to N ConnectionActors
//! │   └── ConnectionActor (one per signaling WebSocket)
//! └── reports occupancy to
//!     OrchestratorActor (singleton)
//!     └── supervises up to max_workers worker processes
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer per state**: rooms belong to the relay, workers and
//!   their timers to the orchestrator; neither shares memory with the other
//! - **Non-blocking fan-out**: the relay never waits on a client socket
//! - **CancellationToken propagation**: connection actors hold child tokens of
//!   the relay token
//! - **Mailbox monitoring**: depth thresholds with metrics (Relay: 200/1000,
//!   Orchestrator: 50/200, Connection: 32/96)
//!
//! # Modules
//!
//! - [`relay`] - `RelayActor` singleton that owns rooms
//! - [`orchestrator`] - `OrchestratorActor` singleton that owns workers
//! - [`connection`] - `ConnectionActor` per WebSocket
//! - [`registry`] - Room and participant state, offer-initiator rule
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod connection;
pub mod messages;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod relay;

// Re-export primary types
pub use connection::{ConnectionActor, ConnectionHandle};
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use orchestrator::{OrchestratorActor, OrchestratorHandle, OrchestratorSettings};
pub use registry::should_create_offer;
pub use relay::{RelayActor, RelayActorHandle};
