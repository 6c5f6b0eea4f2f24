//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (TETHER_*)
//! - TOML configuration file
//! - Command line arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tether_transport::long_polling::DEFAULT_POLL_TIMEOUT;
use tether_transport::TransportType;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint URL (`http`/`https`; rewritten to `ws`/`wss` for WebSockets).
    #[serde(default = "default_url")]
    pub url: String,

    /// Query string appended to the URL, without the leading `?`.
    #[serde(default)]
    pub query: String,

    /// Transport to use.
    #[serde(default = "default_transport")]
    pub transport: TransportType,

    /// Client-side timeout of one long poll in milliseconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,

    /// Timeout of an outbound message post in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_url() -> String {
    std::env::var("TETHER_URL").unwrap_or_else(|_| "http://127.0.0.1:5000/chat".to_string())
}

fn default_transport() -> TransportType {
    std::env::var("TETHER_TRANSPORT")
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(TransportType::WebSockets)
}

fn default_poll_timeout() -> u64 {
    DEFAULT_POLL_TIMEOUT.as_millis() as u64
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            query: String::new(),
            transport: default_transport(),
            poll_timeout_ms: default_poll_timeout(),
            request_timeout_ms: default_request_timeout(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = ["tether.toml", "~/.config/tether/tether.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the long-poll timeout.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Get the outbound post timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
