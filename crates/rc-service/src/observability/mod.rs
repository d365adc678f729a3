//! Observability module for the Room Controller.
//!
//! # Privacy by Default
//!
//! Actor loops and handlers use `#[instrument(skip_all)]` with explicit field
//! allow-listing. Negotiation payloads (SDP, ICE candidates) and worker
//! summaries never reach logs or metric labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `rc_rooms_active` | Gauge | none | Rooms known to the relay |
//! | `rc_participants_active` | Gauge | none | Joined participants |
//! | `rc_workers_active` | Gauge | none | Workers counted against capacity |
//! | `rc_connections_active` | Gauge | none | Open signaling sockets |
//! | `rc_worker_spawns_total` | Counter | `status` | Spawn outcomes |
//! | `rc_worker_terminations_total` | Counter | `reason` | Termination decisions |
//! | `rc_worker_crashes_total` | Counter | none | Unexpected exits |
//! | `rc_signaling_dropped_total` | Counter | `reason` | Undeliverable messages |
//! | `rc_message_latency_seconds` | Histogram | `message_type` | Relay hop latency |
//! | `rc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState, ReadinessStatus};
pub use metrics::init_metrics_recorder;
