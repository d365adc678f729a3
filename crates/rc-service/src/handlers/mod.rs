//! HTTP and WebSocket request handlers for the Room Controller.

pub mod rooms;
pub mod signaling;
pub mod workers;

pub use rooms::{get_room, get_status};
pub use signaling::signaling_ws;
pub use workers::{spawn_worker, terminate_worker};
