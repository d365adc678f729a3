//! Metrics definitions for the Room Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion. Room and participant
//! identifiers never appear as labels.
//! - `actor_type`: 3 values (relay, orchestrator, connection)
//! - `message_type`: bounded by signaling message types (~9 values)
//! - `reason`: bounded by termination and drop reasons (~7 values)
//! - `status`: bounded by spawn outcomes (4 values)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Relay hop latency - in-process routing (p99 < 10ms)
        .set_buckets_for_metric(
            Matcher::Prefix("rc_message".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set message latency buckets: {e}"))?
        // Process launch - fork/exec plus pipe setup
        .set_buckets_for_metric(
            Matcher::Prefix("rc_worker_spawn".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set worker spawn buckets: {e}"))?
        // Worker lifetimes - seconds to hours
        .set_buckets_for_metric(
            Matcher::Full("rc_worker_lifetime_seconds".to_string()),
            &[
                10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 5400.0, 7200.0, 10800.0,
            ],
        )
        .map_err(|e| format!("Failed to set worker lifetime buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Worker Metrics (Gauges)
// ============================================================================

/// Set the number of rooms known to the relay.
///
/// Metric: `rc_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_rooms_active").set(count as f64);
}

/// Set the number of joined participants across all rooms.
///
/// Metric: `rc_participants_active`
pub fn set_participants_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_participants_active").set(count as f64);
}

/// Set the number of workers counted against capacity.
///
/// Metric: `rc_workers_active`
pub fn set_workers_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_workers_active").set(count as f64);
}

/// Set the number of open signaling connections.
///
/// Metric: `rc_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_connections_active").set(count as f64);
}

/// Set the mailbox depth for an actor type.
///
/// Metric: `rc_actor_mailbox_depth`
/// Labels: `actor_type` (relay, orchestrator, connection)
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("rc_actor_mailbox_depth", "actor_type" => actor_type.to_string()).set(depth as f64);
}

// ============================================================================
// Worker Lifecycle (Counters & Histograms)
// ============================================================================

/// Record a spawn attempt.
///
/// Metric: `rc_worker_spawns_total`
/// Labels: `status` (success, capacity_exceeded, spawn_failure, rejected)
pub fn record_worker_spawn(status: &str) {
    counter!("rc_worker_spawns_total", "status" => status.to_string()).increment(1);
}

/// Record how long launching a worker process took.
///
/// Metric: `rc_worker_spawn_duration_seconds`
pub fn record_worker_spawn_duration(duration: Duration) {
    histogram!("rc_worker_spawn_duration_seconds").record(duration.as_secs_f64());
}

/// Record a termination decision.
///
/// Metric: `rc_worker_terminations_total`
/// Labels: `reason` (room-empty, idle-timeout, max-lifetime, unresponsive,
/// worker-requested, manual, shutdown)
pub fn record_worker_termination(reason: &str) {
    counter!("rc_worker_terminations_total", "reason" => reason.to_string()).increment(1);
}

/// Record an unexpected worker exit.
///
/// Metric: `rc_worker_crashes_total`
pub fn record_worker_crash() {
    counter!("rc_worker_crashes_total").increment(1);
}

/// Record a missed heartbeat interval.
///
/// Metric: `rc_worker_heartbeat_misses_total`
pub fn record_heartbeat_miss() {
    counter!("rc_worker_heartbeat_misses_total").increment(1);
}

/// Record a worker that had to be killed after ignoring graceful shutdown.
///
/// Metric: `rc_worker_force_kills_total`
pub fn record_force_kill() {
    counter!("rc_worker_force_kills_total").increment(1);
}

/// Record how long a worker ran, from spawn to confirmed exit.
///
/// Metric: `rc_worker_lifetime_seconds`
pub fn record_worker_lifetime(duration: Duration) {
    histogram!("rc_worker_lifetime_seconds").record(duration.as_secs_f64());
}

// ============================================================================
// Signaling Metrics
// ============================================================================

/// Record a signaling message accepted from a participant.
///
/// Metric: `rc_signaling_messages_total`
/// Labels: `message_type`
pub fn record_signaling_message(message_type: &str) {
    counter!("rc_signaling_messages_total", "message_type" => message_type.to_string())
        .increment(1);
}

/// Record a signaling message that was dropped.
///
/// Metric: `rc_signaling_dropped_total`
/// Labels: `reason` (target_not_found, queue_full, connection_closed,
/// invalid_message, not_joined)
pub fn record_signaling_dropped(reason: &str) {
    counter!("rc_signaling_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Record relay processing latency for a message.
///
/// Metric: `rc_message_latency_seconds`
/// Labels: `message_type`
///
/// SLO target: p99 < 10ms for relay hops
pub fn record_message_latency(message_type: &str, duration: Duration) {
    histogram!("rc_message_latency_seconds", "message_type" => message_type.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Operational Metrics
// ============================================================================

/// Record an actor panic event.
///
/// Metric: `rc_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("rc_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record error by category.
///
/// Metric: `rc_errors_total`
/// Labels: `operation`, `error_type`, `status_code`
pub fn record_error(operation: &str, error_type: &str, status_code: u16) {
    counter!("rc_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    // Without an installed recorder these are no-ops; they must never panic.
    #[test]
    fn test_gauges_without_recorder() {
        set_rooms_active(0);
        set_participants_active(3);
        set_workers_active(5);
        set_connections_active(10);
        set_actor_mailbox_depth("relay", 0);
        set_actor_mailbox_depth("orchestrator", 50);
        set_actor_mailbox_depth("connection", 200);
    }

    #[test]
    fn test_worker_lifecycle_without_recorder() {
        record_worker_spawn("success");
        record_worker_spawn("capacity_exceeded");
        record_worker_spawn_duration(Duration::from_millis(12));
        record_worker_termination("room-empty");
        record_worker_termination("unresponsive");
        record_worker_crash();
        record_heartbeat_miss();
        record_force_kill();
        record_worker_lifetime(Duration::from_secs(3600));
    }

    #[test]
    fn test_signaling_without_recorder() {
        record_signaling_message("offer");
        record_signaling_dropped("target_not_found");
        record_message_latency("ice-candidate", Duration::from_micros(300));
        record_actor_panic("connection");
        record_error("spawn", "capacity_exceeded", 429);
    }

    #[test]
    fn test_metric_names_and_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_workers_active(2);
            record_worker_spawn("success");
            record_worker_spawn("success");
            record_worker_termination("idle-timeout");
            record_signaling_dropped("target_not_found");
            record_message_latency("offer", Duration::from_millis(1));
        });

        let metrics = snapshotter.snapshot().into_vec();

        let spawn_total = metrics
            .iter()
            .find(|(key, _, _, _)| {
                key.kind() == MetricKind::Counter && key.key().name() == "rc_worker_spawns_total"
            })
            .expect("spawn counter recorded");
        assert_eq!(spawn_total.3, DebugValue::Counter(2));
        assert!(spawn_total
            .0
            .key()
            .labels()
            .any(|l| l.key() == "status" && l.value() == "success"));

        let names: Vec<&str> = metrics
            .iter()
            .map(|(key, _, _, _)| key.key().name())
            .collect();
        for expected in [
            "rc_workers_active",
            "rc_worker_terminations_total",
            "rc_signaling_dropped_total",
            "rc_message_latency_seconds",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(names.iter().all(|n| n.starts_with("rc_")));
    }
}
