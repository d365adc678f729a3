//! Room Controller
//!
//! WebSocket signaling relay and AI worker orchestrator.
//!
//! # Servers
//!
//! - HTTP server for signaling and the control API (default: 0.0.0.0:8080)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Start health HTTP server (liveness, readiness, metrics)
//! 4. Spawn the orchestrator and relay actors
//! 5. Start the signaling/control server and mark ready
//! 6. Wait for shutdown signal, then drain: stop accepting, close rooms,
//!    terminate every worker

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rc_service::actors::{ActorMetrics, ActorType, OrchestratorActor, RelayActor};
use rc_service::config::Config;
use rc_service::observability::{health_router, init_metrics_recorder, HealthState};
use rc_service::routes::{build_routes, AppState};
use rc_service::worker::CommandLauncher;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. Component targets ("rc.actor.relay", ...) share the "rc" prefix.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rc=debug,tower_http=debug".into());
    let json_logs = std::env::var("RC_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Room Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        rc_id = %config.rc_id,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        max_workers = config.max_workers,
        max_participants_per_room = config.max_participants_per_room,
        auto_spawn = config.auto_spawn,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        anyhow::anyhow!(e)
    })?;

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config
        .health_bind_address
        .parse()
        .with_context(|| format!("Invalid health bind address {}", config.health_bind_address))?;

    // Bind listener BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("Failed to bind health server to {health_addr}"))?;

    let health_app = health_router(Arc::clone(&health_state), Some(prometheus_handle));
    let health_shutdown = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Actor system
    let actor_metrics = ActorMetrics::new();
    let launcher = Arc::new(CommandLauncher::new(
        config.worker_program.clone(),
        config.worker_args.clone(),
    ));
    let (orchestrator, orchestrator_task) = OrchestratorActor::spawn(
        config.rc_id.clone(),
        config.orchestrator_settings(),
        launcher,
        Arc::clone(&actor_metrics),
    );
    let (relay, relay_task) = RelayActor::spawn(
        config.rc_id.clone(),
        config.max_participants_per_room,
        Some(orchestrator.clone()),
        Arc::clone(&actor_metrics),
    );
    info!("Actor system initialized");

    // Signaling and control API
    let bind_addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind signaling server to {bind_addr}"))?;

    let app = build_routes(Arc::new(AppState {
        relay: relay.clone(),
        orchestrator: orchestrator.clone(),
        metrics: Arc::clone(&actor_metrics),
        ping_interval: config.signaling_ping_interval(),
    }));
    let server_shutdown = shutdown_token.child_token();
    let server_task = tokio::spawn(async move {
        info!(addr = %bind_addr, "Signaling server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_shutdown.cancelled().await;
            info!("Signaling server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Signaling server failed");
        }
    });

    health_state.set_ready();
    info!("Room Controller running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop sending traffic
    health_state.set_draining();

    let drain = async {
        if let Err(e) = relay.shutdown().await {
            warn!(error = %e, "Relay shutdown error");
        }
        if let Err(e) = orchestrator.shutdown().await {
            warn!(error = %e, "Orchestrator shutdown error");
        }
    };
    if tokio::time::timeout(config.shutdown_timeout(), drain)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.shutdown_timeout().as_secs(),
            "Shutdown timed out, abandoning remaining workers"
        );
    }

    relay.cancel();
    orchestrator.cancel();
    shutdown_token.cancel();

    for (name, actor_type, task) in [
        ("relay", Some(ActorType::Relay), relay_task),
        ("orchestrator", Some(ActorType::Orchestrator), orchestrator_task),
        ("signaling server", None, server_task),
        ("health server", None, health_task),
    ] {
        match task.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                if let Some(actor_type) = actor_type {
                    actor_metrics.record_panic(actor_type);
                }
                error!(task = name, "Task panicked");
            }
            Err(e) => warn!(task = name, error = %e, "Task ended abnormally"),
        }
    }

    info!("Room Controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
