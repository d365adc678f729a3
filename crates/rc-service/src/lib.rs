//! Room Controller (RC) Service Library
//!
//! The Room Controller serves small real-time rooms (up to three
//! participants) where one participant may be an AI worker process:
//!
//! - WebSocket signaling relay: peer discovery plus offer/answer/ICE
//!   forwarding between the participants of a room
//! - Worker orchestration: one AI worker process per room, launched on
//!   demand, health-checked, and terminated on idle, lifetime or empty room
//! - HTTP control API for spawning, terminating and inspecting workers
//!
//! # Architecture
//!
//! ```text
//! RelayActor (singleton)
//! ├── owns every room and its participants
//! ├── notifies OrchestratorActor of joins and leaves
//! └── delivers to N ConnectionActors (one per signaling socket)
//!
//! OrchestratorActor (singleton)
//! └── supervises N worker processes (at most one per room)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - relay, orchestrator and connection actors
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types with stable error codes
//! - [`handlers`] / [`routes`] - signaling and control API endpoints
//! - [`worker`] - worker launch contract and process supervision

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod timers;
pub mod worker;
