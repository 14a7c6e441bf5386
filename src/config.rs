//! Server configuration
//!
//! Every field has a default, so an empty (or missing) TOML file yields a
//! working server on `127.0.0.1:8888`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Runtime settings for a `ChatServer`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address (host:port)
    pub bind_addr: String,
    /// Seconds without a parsed line before a session is evicted
    pub idle_timeout_secs: u64,
    /// Per-session outbound queue size
    pub mailbox_capacity: usize,
    /// Shared broadcast bus size
    pub bus_capacity: usize,
    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".to_string(),
            idle_timeout_secs: 60,
            mailbox_capacity: 64,
            bus_capacity: 256,
            max_line_length: 4096,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
