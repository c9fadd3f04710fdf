//! Configuration loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub listen: ListenConfig,
    pub auth: AuthConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name used in logs (e.g. "relay.example.net").
    pub name: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// WebSocket listener address.
    pub address: SocketAddr,
    /// HTTP API listener address. Absent disables the HTTP API.
    pub http_address: Option<SocketAddr>,
    /// Allowed WebSocket origins. Empty allows all origins.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

/// Session verifier (external auth provider) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth provider API (e.g. "https://auth.example.net/v1").
    pub endpoint: String,
    /// Project identifier sent alongside the session token.
    pub project_id: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Tunable limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Default page size for history fetches.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    /// Upper bound a client may request for one history page.
    #[serde(default = "default_history_page_max")]
    pub history_page_max: u32,
    /// Per-connection outbound queue depth. A full queue counts as a failed
    /// send and schedules the connection for close.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_history_page_size() -> u32 {
    50
}

fn default_history_page_max() -> u32 {
    200
}

fn default_outbound_queue() -> usize {
    128
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            history_page_size: default_history_page_size(),
            history_page_max: default_history_page_max(),
            outbound_queue: default_outbound_queue(),
        }
    }
}
