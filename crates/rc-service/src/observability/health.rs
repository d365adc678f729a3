//! Probe endpoints, served on their own listener.
//!
//! - `GET /health` answers 200 whenever the process can serve HTTP.
//! - `GET /ready` answers 200 only in the `ready` phase.
//! - `GET /metrics` renders Prometheus text when a handle is supplied.
//!
//! The service moves through `starting → ready → draining` and never goes
//! back, so a draining instance stays out of rotation while workers finish.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle phase reported by `/ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ReadinessStatus {
    Starting = 0,
    Ready = 1,
    Draining = 2,
}

impl ReadinessStatus {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReadinessStatus::Starting,
            1 => ReadinessStatus::Ready,
            _ => ReadinessStatus::Draining,
        }
    }
}

/// Shared between `main` and the probe router.
#[derive(Debug)]
pub struct HealthState {
    phase: AtomicU8,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ReadinessStatus::Starting as u8),
        }
    }

    /// Both actors and both listeners are up.
    pub fn set_ready(&self) {
        self.advance(ReadinessStatus::Ready);
    }

    pub fn set_draining(&self) {
        self.advance(ReadinessStatus::Draining);
    }

    /// Phases only move forward.
    fn advance(&self, to: ReadinessStatus) {
        self.phase.fetch_max(to as u8, Ordering::SeqCst);
    }

    #[must_use]
    pub fn status(&self) -> ReadinessStatus {
        ReadinessStatus::from_u8(self.phase.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == ReadinessStatus::Ready
    }
}

#[derive(Debug, Serialize)]
struct ReadinessBody {
    status: ReadinessStatus,
}

/// Build the probe router.
///
/// `/metrics` is mounted only when `prometheus` is `Some`, so tests can
/// build the router without installing the global recorder.
pub fn health_router(
    health_state: Arc<HealthState>,
    prometheus: Option<PrometheusHandle>,
) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ready", get(readiness))
        .with_state(health_state);

    let Some(handle) = prometheus else {
        return router;
    };
    router.route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

async fn readiness(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<ReadinessBody>) {
    let status = state.status();
    let code = match status {
        ReadinessStatus::Ready => StatusCode::OK,
        ReadinessStatus::Starting | ReadinessStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(ReadinessBody { status }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    #[test]
    fn test_phase_only_moves_forward() {
        let state = HealthState::new();
        assert_eq!(state.status(), ReadinessStatus::Starting);
        assert!(!state.is_ready());

        state.set_ready();
        assert!(state.is_ready());

        state.set_draining();
        assert_eq!(state.status(), ReadinessStatus::Draining);

        state.set_ready();
        assert_eq!(state.status(), ReadinessStatus::Draining);
        assert!(!state.is_ready());
    }

    #[test]
    fn test_draining_before_ready() {
        let state = HealthState::new();
        state.set_draining();
        state.set_ready();
        assert_eq!(state.status(), ReadinessStatus::Draining);
    }

    async fn probe(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_liveness_is_unconditional() {
        let state = Arc::new(HealthState::new());
        state.set_draining();
        let (status, _) = probe(health_router(state, None), "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_reports_phase() {
        let state = Arc::new(HealthState::new());

        let (status, body) = probe(health_router(Arc::clone(&state), None), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, br#"{"status":"starting"}"#);

        state.set_ready();
        let (status, body) = probe(health_router(Arc::clone(&state), None), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, br#"{"status":"ready"}"#);

        state.set_draining();
        let (status, body) = probe(health_router(Arc::clone(&state), None), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, br#"{"status":"draining"}"#);
    }

    #[tokio::test]
    async fn test_metrics_route_needs_handle() {
        let app = health_router(Arc::new(HealthState::new()), None);
        let (status, _) = probe(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
