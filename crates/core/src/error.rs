//! # Error Taxonomy
//!
//! Errors raised by sessions, configuration validation, and the swarm
//! controller. Session errors never escape their session driver; they
//! are logged and end the session in the `Failed` state.

use std::time::Duration;
use thiserror::Error;

/// Why a session failed before reaching `Active`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Transport-level failure to reach the host
    #[error("connect failed: {0}")]
    Connect(String),
    /// The transport did not come up within the connect timeout
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
    /// Protocol-level rejection during handshake or login
    #[error("login failed: {0}")]
    Login(String),
    /// The swarm shut down before the session joined. Not a server-side failure.
    #[error("shut down before joining")]
    Aborted,
}

impl SessionError {
    /// Whether the failure happened at the transport level
    pub fn is_connect(&self) -> bool {
        matches!(self, SessionError::Connect(_) | SessionError::Timeout(_))
    }
}

/// Invalid swarm configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("admission delay must be greater than zero")]
    ZeroDelay,
    #[error("buffer must allow at least one in-flight session")]
    ZeroBuffer,
    #[error("session name prefix must not be empty")]
    EmptyPrefix,
}

/// Errors raised by the swarm controller itself
#[derive(Debug, Error)]
pub enum SwarmError {
    /// No Tokio runtime is available to drive the periodic loops
    #[error("cannot schedule admission and reporting loops: no async runtime is running")]
    NoRuntime,
    #[error("swarm is already running")]
    AlreadyStarted,
    #[error("swarm has been shut down")]
    ShutDown,
    #[error("invalid swarm configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
