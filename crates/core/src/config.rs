//! # Swarm Configuration
//!
//! Immutable settings handed to the swarm controller at construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Default game server port
pub const DEFAULT_PORT: u16 = 25565;

/// Where the swarm connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Configuration for the swarm controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of sessions to admit in total
    pub target_count: u32,
    /// Admission tick period in milliseconds
    pub delay_ms: u64,
    /// Maximum number of sessions created but not yet active
    pub buffer: u32,
    /// Prefix for session display names
    pub prefix: String,
    /// Richer client simulation. Reserved; has no effect on sessions.
    pub simulate: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            target_count: 500,
            delay_ms: 20,
            buffer: 20,
            prefix: "Player".to_string(),
            simulate: true,
        }
    }
}

impl SwarmConfig {
    /// Admission tick period
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Check that the runtime can honour this configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delay_ms == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        if self.buffer == 0 {
            return Err(ConfigError::ZeroBuffer);
        }
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_swarm_config_default() {
        let config = SwarmConfig::default();
        assert_eq!(config.target_count, 500);
        assert_eq!(config.delay(), Duration::from_millis(20));
        assert_eq!(config.buffer, 20);
        assert_eq!(config.prefix, "Player");
        assert!(config.simulate);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let zero_delay = SwarmConfig {
            delay_ms: 0,
            ..SwarmConfig::default()
        };
        assert_eq!(zero_delay.validate(), Err(ConfigError::ZeroDelay));

        let zero_buffer = SwarmConfig {
            buffer: 0,
            ..SwarmConfig::default()
        };
        assert_eq!(zero_buffer.validate(), Err(ConfigError::ZeroBuffer));

        let no_prefix = SwarmConfig {
            prefix: String::new(),
            ..SwarmConfig::default()
        };
        assert_eq!(assert_err!(no_prefix.validate()), ConfigError::EmptyPrefix);
    }

    #[test]
    fn test_zero_target_is_valid() {
        let idle = SwarmConfig {
            target_count: 0,
            ..SwarmConfig::default()
        };
        assert_ok!(idle.validate());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SwarmConfig =
            serde_json::from_str(r#"{"target_count": 3, "buffer": 1}"#).unwrap();
        assert_eq!(config.target_count, 3);
        assert_eq!(config.buffer, 1);
        assert_eq!(config.delay_ms, 20);
    }

    #[test]
    fn test_server_address_display() {
        assert_eq!(
            ServerAddress::new("localhost", DEFAULT_PORT).to_string(),
            "localhost:25565"
        );
    }
}
