//! Supervisor configuration
//!
//! Handles loading and saving connection configuration from TOML files.
//! The configuration carries everything the supervisor consults when
//! building a new session: the remote endpoint list and the timeout knobs.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connect::remote::Remote;
use crate::error::{ConfigError, Result};

fn default_conn_timeout() -> u32 {
    30
}

/// Connection supervisor configuration
///
/// Contains all parameters the supervisor reads while driving connection
/// attempts. Protocol-level settings (credentials, crypto) belong to the
/// session implementation, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Remote endpoints, tried in order with wrap-around rotation
    pub remotes: Vec<Remote>,

    /// Overall connection timeout in seconds; 0 disables the timer
    #[serde(default = "default_conn_timeout")]
    pub conn_timeout_secs: u32,

    /// How long to wait for the first inbound packet before cycling to the
    /// next remote; `None` disables server polling
    #[serde(default)]
    pub server_poll_timeout_secs: Option<u32>,

    /// Pause instead of halting when the connection timer expires
    #[serde(default)]
    pub pause_on_connection_timeout: bool,
}

impl ConnectConfig {
    /// Create a configuration with default timeouts for the given remotes
    pub fn new(remotes: Vec<Remote>) -> Self {
        Self {
            remotes,
            conn_timeout_secs: default_conn_timeout(),
            server_poll_timeout_secs: None,
            pause_on_connection_timeout: false,
        }
    }

    /// Validate the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(())` if all fields are valid
    /// * `Err(ConfigError)` with the first validation error encountered
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.remotes.is_empty() {
            return Err(ConfigError::NoRemotes);
        }

        for remote in &self.remotes {
            if remote.host.is_empty() {
                return Err(ConfigError::EmptyHost);
            }

            // Basic hostname validation
            if !remote
                .host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
            {
                return Err(ConfigError::InvalidHost {
                    host: remote.host.clone(),
                });
            }

            if remote.port == 0 {
                return Err(ConfigError::ZeroPort {
                    host: remote.host.clone(),
                });
            }
        }

        if self.server_poll_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroServerPollTimeout);
        }

        Ok(())
    }

    /// Connection timeout as a duration; `None` when disabled
    pub fn conn_timeout(&self) -> Option<Duration> {
        (self.conn_timeout_secs > 0).then(|| Duration::from_secs(u64::from(self.conn_timeout_secs)))
    }

    /// Server poll timeout as a duration; `None` when disabled
    pub fn server_poll_timeout(&self) -> Option<Duration> {
        self.server_poll_timeout_secs
            .map(|secs| Duration::from_secs(u64::from(secs)))
    }

    /// Load and validate a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
