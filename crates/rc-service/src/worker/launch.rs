//! Worker launch contract.
//!
//! A `LaunchConfig` can only be obtained through [`LaunchConfigBuilder::build`],
//! which validates every field. It renders to an argument vector and an
//! environment map; nothing is ever joined into a shell string.

use crate::errors::RcError;
use std::time::Duration;
use thiserror::Error;

/// Longest identifier accepted in a launch contract.
pub const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} is longer than {MAX_IDENTIFIER_LEN} bytes")]
    TooLong { field: &'static str },

    #[error("{field} contains unsupported character {character:?}")]
    InvalidCharacter { field: &'static str, character: char },

    #[error("callback port must be non-zero")]
    InvalidPort,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl From<LaunchConfigError> for RcError {
    fn from(err: LaunchConfigError) -> Self {
        RcError::InvalidLaunchConfig(err.to_string())
    }
}

/// Validated startup contract for one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    room_id: String,
    session_id: String,
    supervisor_id: Option<String>,
    secondary_id: Option<String>,
    callback_host: String,
    callback_port: u16,
    max_lifetime: Duration,
    idle_timeout: Duration,
    test_mode: bool,
}

impl LaunchConfig {
    #[must_use]
    pub fn builder(
        room_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> LaunchConfigBuilder {
        LaunchConfigBuilder {
            room_id: room_id.into(),
            session_id: session_id.into(),
            supervisor_id: None,
            secondary_id: None,
            callback_host: String::new(),
            callback_port: 0,
            max_lifetime: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            test_mode: false,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn supervisor_id(&self) -> Option<&str> {
        self.supervisor_id.as_deref()
    }

    #[must_use]
    pub fn secondary_id(&self) -> Option<&str> {
        self.secondary_id.as_deref()
    }

    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// WebSocket URL the worker uses to join its room.
    #[must_use]
    pub fn callback_url(&self) -> String {
        let host = if self.callback_host.contains(':') && !self.callback_host.starts_with('[') {
            format!("[{}]", self.callback_host)
        } else {
            self.callback_host.clone()
        };
        format!("ws://{host}:{}/ws/{}", self.callback_port, self.room_id)
    }

    /// Command-line arguments, appended after the configured base arguments.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--room-id".to_string(),
            self.room_id.clone(),
            "--session-id".to_string(),
            self.session_id.clone(),
        ];
        if let Some(id) = &self.supervisor_id {
            args.push("--supervisor-id".to_string());
            args.push(id.clone());
        }
        if let Some(id) = &self.secondary_id {
            args.push("--secondary-id".to_string());
            args.push(id.clone());
        }
        args.extend([
            "--callback-host".to_string(),
            self.callback_host.clone(),
            "--callback-port".to_string(),
            self.callback_port.to_string(),
            "--max-lifetime-secs".to_string(),
            self.max_lifetime.as_secs().to_string(),
            "--idle-timeout-secs".to_string(),
            self.idle_timeout.as_secs().to_string(),
        ]);
        if self.test_mode {
            args.push("--test-mode".to_string());
        }
        args
    }

    /// Environment variables mirroring the arguments.
    #[must_use]
    pub fn to_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("RC_ROOM_ID".to_string(), self.room_id.clone()),
            ("RC_SESSION_ID".to_string(), self.session_id.clone()),
            ("RC_CALLBACK_HOST".to_string(), self.callback_host.clone()),
            ("RC_CALLBACK_PORT".to_string(), self.callback_port.to_string()),
            ("RC_CALLBACK_URL".to_string(), self.callback_url()),
            (
                "RC_MAX_LIFETIME_SECS".to_string(),
                self.max_lifetime.as_secs().to_string(),
            ),
            (
                "RC_IDLE_TIMEOUT_SECS".to_string(),
                self.idle_timeout.as_secs().to_string(),
            ),
            (
                "RC_TEST_MODE".to_string(),
                if self.test_mode { "1" } else { "0" }.to_string(),
            ),
        ];
        if let Some(id) = &self.supervisor_id {
            env.push(("RC_SUPERVISOR_ID".to_string(), id.clone()));
        }
        if let Some(id) = &self.secondary_id {
            env.push(("RC_SECONDARY_ID".to_string(), id.clone()));
        }
        env
    }
}

#[derive(Debug, Clone)]
pub struct LaunchConfigBuilder {
    room_id: String,
    session_id: String,
    supervisor_id: Option<String>,
    secondary_id: Option<String>,
    callback_host: String,
    callback_port: u16,
    max_lifetime: Duration,
    idle_timeout: Duration,
    test_mode: bool,
}

impl LaunchConfigBuilder {
    #[must_use]
    pub fn supervisor(mut self, id: Option<String>) -> Self {
        self.supervisor_id = id;
        self
    }

    #[must_use]
    pub fn secondary(mut self, id: Option<String>) -> Self {
        self.secondary_id = id;
        self
    }

    #[must_use]
    pub fn callback(mut self, host: impl Into<String>, port: u16) -> Self {
        self.callback_host = host.into();
        self.callback_port = port;
        self
    }

    #[must_use]
    pub fn limits(mut self, max_lifetime: Duration, idle_timeout: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// Returns `LaunchConfigError` for empty or unsafe identifiers, an invalid
    /// callback address, or zero durations.
    pub fn build(self) -> Result<LaunchConfig, LaunchConfigError> {
        validate_identifier("room_id", &self.room_id)?;
        validate_identifier("session_id", &self.session_id)?;
        if let Some(id) = &self.supervisor_id {
            validate_identifier("supervisor_id", id)?;
        }
        if let Some(id) = &self.secondary_id {
            validate_identifier("secondary_id", id)?;
        }
        validate_host(&self.callback_host)?;
        if self.callback_port == 0 {
            return Err(LaunchConfigError::InvalidPort);
        }
        if self.max_lifetime.is_zero() {
            return Err(LaunchConfigError::ZeroDuration("max_lifetime"));
        }
        if self.idle_timeout.is_zero() {
            return Err(LaunchConfigError::ZeroDuration("idle_timeout"));
        }

        Ok(LaunchConfig {
            room_id: self.room_id,
            session_id: self.session_id,
            supervisor_id: self.supervisor_id,
            secondary_id: self.secondary_id,
            callback_host: self.callback_host,
            callback_port: self.callback_port,
            max_lifetime: self.max_lifetime,
            idle_timeout: self.idle_timeout,
            test_mode: self.test_mode,
        })
    }
}

/// Accepts identifiers safe to pass as a single argv element and to embed in
/// a URL path: `[A-Za-z0-9._:@-]`, at most 128 bytes.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), LaunchConfigError> {
    if value.is_empty() {
        return Err(LaunchConfigError::Empty(field));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(LaunchConfigError::TooLong { field });
    }
    if let Some(character) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '@' | '-')))
    {
        return Err(LaunchConfigError::InvalidCharacter { field, character });
    }
    Ok(())
}

fn validate_host(host: &str) -> Result<(), LaunchConfigError> {
    if host.is_empty() {
        return Err(LaunchConfigError::Empty("callback_host"));
    }
    if let Some(character) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']')))
    {
        return Err(LaunchConfigError::InvalidCharacter {
            field: "callback_host",
            character,
        });
    }
    Ok(())
}
