//! Board service configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults. Nothing here is secret.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default capacity of a session actor's mailbox.
pub const DEFAULT_SESSION_MAILBOX: usize = 500;

/// Default capacity of each client's outbound buffer.
pub const DEFAULT_CLIENT_BUFFER: usize = 256;

/// Default time allowed for sessions to close on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;

/// Board service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Capacity of each session actor's request mailbox.
    pub session_mailbox: usize,

    /// Capacity of each client's outbound event buffer. A client that falls
    /// this many events behind is disconnected.
    pub client_buffer: usize,

    /// Deadline for sessions to close during shutdown.
    pub shutdown_timeout_seconds: u64,

    /// Emit logs as JSON instead of human-readable text.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            session_mailbox: DEFAULT_SESSION_MAILBOX,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            shutdown_timeout_seconds: DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
            log_json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BOARD_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let session_mailbox =
            parse_var(vars, "BOARD_SESSION_MAILBOX")?.unwrap_or(DEFAULT_SESSION_MAILBOX);
        require_nonzero("BOARD_SESSION_MAILBOX", session_mailbox)?;

        let client_buffer =
            parse_var(vars, "BOARD_CLIENT_BUFFER")?.unwrap_or(DEFAULT_CLIENT_BUFFER);
        require_nonzero("BOARD_CLIENT_BUFFER", client_buffer)?;

        let shutdown_timeout_seconds = parse_var(vars, "BOARD_SHUTDOWN_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECONDS);

        let log_json = parse_var(vars, "BOARD_LOG_JSON")?.unwrap_or(false);

        Ok(Config {
            bind_address,
            session_mailbox,
            client_buffer,
            shutdown_timeout_seconds,
            log_json,
        })
    }

    /// Shutdown deadline as a `Duration`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    vars.get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn require_nonzero(name: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            var: name.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
