//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables. Every duration is
//! expressed in whole seconds and must be non-zero.

use crate::actors::orchestrator::OrchestratorSettings;
use common::types::ParticipantRole;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the signaling WebSocket and control API.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default host workers use to reach the relay.
pub const DEFAULT_CALLBACK_HOST: &str = "127.0.0.1";

/// Default global worker capacity.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Default relay room capacity (two operators plus one worker).
pub const DEFAULT_MAX_PARTICIPANTS_PER_ROOM: usize = 3;

/// Default hard worker lifetime (2 hours).
pub const DEFAULT_WORKER_MAX_LIFETIME_SECONDS: u64 = 7200;

/// Default worker inactivity timeout (30 minutes).
pub const DEFAULT_WORKER_IDLE_TIMEOUT_SECONDS: u64 = 1800;

/// Default grace period before an empty room's worker is terminated.
pub const DEFAULT_ROOM_EMPTY_GRACE_SECONDS: u64 = 60;

/// Default heartbeat sweep interval.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS: u64 = 30;

/// Default window between graceful shutdown and forced kill.
pub const DEFAULT_TERMINATION_GRACE_SECONDS: u64 = 10;

/// Default upper bound on process-wide shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Default server-initiated ping cadence on signaling connections.
pub const DEFAULT_SIGNALING_PING_INTERVAL_SECONDS: u64 = 25;

/// Default RC instance ID prefix.
pub const DEFAULT_RC_ID_PREFIX: &str = "rc";

/// Room Controller configuration.
#[derive(Clone)]
pub struct Config {
    /// Unique identifier for this instance, used in logs.
    pub rc_id: String,

    /// Signaling WebSocket and control API bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Host handed to workers for reaching the relay.
    pub callback_host: String,

    /// Port handed to workers for reaching the relay.
    pub callback_port: u16,

    /// Worker executable.
    pub worker_program: PathBuf,

    /// Arguments placed before the launch contract arguments.
    pub worker_args: Vec<String>,

    /// Global worker capacity.
    pub max_workers: usize,

    /// Relay room capacity.
    pub max_participants_per_room: usize,

    pub worker_max_lifetime_seconds: u64,
    pub worker_idle_timeout_seconds: u64,
    pub room_empty_grace_seconds: u64,
    pub health_check_interval_seconds: u64,
    pub termination_grace_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    pub signaling_ping_interval_seconds: u64,

    /// Spawn a worker automatically when `spawn_trigger_role` joins.
    pub auto_spawn: bool,

    pub spawn_trigger_role: ParticipantRole,

    /// Default test-mode flag passed to workers.
    pub worker_test_mode: bool,
}

/// Custom Debug implementation that keeps the worker command line out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rc_id", &self.rc_id)
            .field("bind_address", &self.bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("callback_host", &self.callback_host)
            .field("callback_port", &self.callback_port)
            .field("worker_program", &self.worker_program)
            .field("worker_args", &format!("[{} args]", self.worker_args.len()))
            .field("max_workers", &self.max_workers)
            .field("max_participants_per_room", &self.max_participants_per_room)
            .field(
                "worker_max_lifetime_seconds",
                &self.worker_max_lifetime_seconds,
            )
            .field(
                "worker_idle_timeout_seconds",
                &self.worker_idle_timeout_seconds,
            )
            .field("room_empty_grace_seconds", &self.room_empty_grace_seconds)
            .field(
                "health_check_interval_seconds",
                &self.health_check_interval_seconds,
            )
            .field("termination_grace_seconds", &self.termination_grace_seconds)
            .field("shutdown_timeout_seconds", &self.shutdown_timeout_seconds)
            .field(
                "signaling_ping_interval_seconds",
                &self.signaling_ping_interval_seconds,
            )
            .field("auto_spawn", &self.auto_spawn)
            .field("spawn_trigger_role", &self.spawn_trigger_role)
            .field("worker_test_mode", &self.worker_test_mode)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let worker_program = vars
            .get("RC_WORKER_PROGRAM")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("RC_WORKER_PROGRAM".to_string()))?;

        let worker_args = vars
            .get("RC_WORKER_ARGS")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let bind_address = vars
            .get("RC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let bind_socket: SocketAddr = bind_address.parse().map_err(|e| {
            ConfigError::InvalidValue(format!("RC_BIND_ADDRESS '{bind_address}': {e}"))
        })?;

        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let callback_host = vars
            .get("RC_CALLBACK_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CALLBACK_HOST.to_string());

        let callback_port = match vars.get("RC_CALLBACK_PORT") {
            Some(raw) => raw.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(|| {
                ConfigError::InvalidValue(format!("RC_CALLBACK_PORT '{raw}' is not a valid port"))
            })?,
            None => bind_socket.port(),
        };

        let max_workers = parse_positive(vars, "RC_MAX_WORKERS", DEFAULT_MAX_WORKERS)?;

        let max_participants_per_room = parse_positive(
            vars,
            "RC_MAX_PARTICIPANTS_PER_ROOM",
            DEFAULT_MAX_PARTICIPANTS_PER_ROOM,
        )?;
        if max_participants_per_room < 2 {
            return Err(ConfigError::InvalidValue(
                "RC_MAX_PARTICIPANTS_PER_ROOM must be at least 2".to_string(),
            ));
        }

        let worker_max_lifetime_seconds = parse_positive(
            vars,
            "RC_WORKER_MAX_LIFETIME_SECONDS",
            DEFAULT_WORKER_MAX_LIFETIME_SECONDS,
        )?;
        let worker_idle_timeout_seconds = parse_positive(
            vars,
            "RC_WORKER_IDLE_TIMEOUT_SECONDS",
            DEFAULT_WORKER_IDLE_TIMEOUT_SECONDS,
        )?;
        let room_empty_grace_seconds = parse_positive(
            vars,
            "RC_ROOM_EMPTY_GRACE_SECONDS",
            DEFAULT_ROOM_EMPTY_GRACE_SECONDS,
        )?;
        let health_check_interval_seconds = parse_positive(
            vars,
            "RC_HEALTH_CHECK_INTERVAL_SECONDS",
            DEFAULT_HEALTH_CHECK_INTERVAL_SECONDS,
        )?;
        let termination_grace_seconds = parse_positive(
            vars,
            "RC_TERMINATION_GRACE_SECONDS",
            DEFAULT_TERMINATION_GRACE_SECONDS,
        )?;
        let shutdown_timeout_seconds = parse_positive(
            vars,
            "RC_SHUTDOWN_TIMEOUT_SECONDS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        )?;
        let signaling_ping_interval_seconds = parse_positive(
            vars,
            "RC_SIGNALING_PING_INTERVAL_SECONDS",
            DEFAULT_SIGNALING_PING_INTERVAL_SECONDS,
        )?;

        let auto_spawn = parse_bool(vars, "RC_AUTO_SPAWN", true)?;
        let worker_test_mode = parse_bool(vars, "RC_WORKER_TEST_MODE", false)?;

        let spawn_trigger_role = match vars.get("RC_SPAWN_TRIGGER_ROLE") {
            Some(raw) => raw
                .parse::<ParticipantRole>()
                .map_err(|e| ConfigError::InvalidValue(format!("RC_SPAWN_TRIGGER_ROLE: {e}")))?,
            None => ParticipantRole::OperatorPrimary,
        };

        let rc_id = vars.get("RC_ID").cloned().unwrap_or_else(|| {
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RC_ID_PREFIX}-{short_suffix}")
        });

        Ok(Config {
            rc_id,
            bind_address,
            health_bind_address,
            callback_host,
            callback_port,
            worker_program,
            worker_args,
            max_workers,
            max_participants_per_room,
            worker_max_lifetime_seconds,
            worker_idle_timeout_seconds,
            room_empty_grace_seconds,
            health_check_interval_seconds,
            termination_grace_seconds,
            shutdown_timeout_seconds,
            signaling_ping_interval_seconds,
            auto_spawn,
            spawn_trigger_role,
            worker_test_mode,
        })
    }

    /// Orchestrator policy derived from this configuration.
    #[must_use]
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_workers: self.max_workers,
            max_lifetime: Duration::from_secs(self.worker_max_lifetime_seconds),
            idle_timeout: Duration::from_secs(self.worker_idle_timeout_seconds),
            empty_room_grace: Duration::from_secs(self.room_empty_grace_seconds),
            health_check_interval: Duration::from_secs(self.health_check_interval_seconds),
            termination_grace: Duration::from_secs(self.termination_grace_seconds),
            callback_host: self.callback_host.clone(),
            callback_port: self.callback_port,
            auto_spawn: self.auto_spawn,
            spawn_trigger_role: self.spawn_trigger_role,
            test_mode: self.worker_test_mode,
        }
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    #[must_use]
    pub fn signaling_ping_interval(&self) -> Duration {
        Duration::from_secs(self.signaling_ping_interval_seconds)
    }
}

fn parse_positive<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidValue(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn parse_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}
