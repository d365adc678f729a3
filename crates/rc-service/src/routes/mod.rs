//! HTTP routes for the Room Controller.
//!
//! Defines the Axum router and application state. Signaling and the worker
//! control API share one listener; health and metrics live on their own
//! (see [`crate::observability::health_router`]).

use crate::actors::{ActorMetrics, OrchestratorHandle, RelayActorHandle};
use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayActorHandle,
    pub orchestrator: OrchestratorHandle,
    pub metrics: Arc<ActorMetrics>,
    /// Server-initiated ping cadence on signaling sockets.
    pub ping_interval: Duration,
}

/// Build the application routes.
///
/// - `GET /ws/{room_id}` - signaling WebSocket
/// - `POST /v1/rooms/{room_id}/worker` - spawn a worker
/// - `DELETE /v1/rooms/{room_id}/worker` - terminate a worker
/// - `GET /v1/rooms/{room_id}` - room participants and worker
/// - `GET /v1/status` - service totals
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/:room_id", get(handlers::signaling_ws))
        .route(
            "/v1/rooms/:room_id/worker",
            post(handlers::spawn_worker).delete(handlers::terminate_worker),
        )
        .route("/v1/rooms/:room_id", get(handlers::get_room))
        .route("/v1/status", get(handlers::get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
