//! Wire types shared across Room Controller components.
//!
//! The Room Controller relays signaling messages between room participants
//! and supervises AI worker processes. Both of those conversations use JSON,
//! and the types describing them live here so that workers, test clients and
//! the service agree on a single definition.

#![warn(clippy::pedantic)]

/// Module for protocol decode errors
pub mod error;

/// Module for participant roles and kinds
pub mod types;

/// Module for the room signaling protocol (participant <-> relay)
pub mod signaling;

/// Module for the worker control channel (worker <-> orchestrator)
pub mod control;
