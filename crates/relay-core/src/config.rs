//! Configuration for the call relay
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CALLRELAY__SECTION__KEY` environment variables.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Fixed pause between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Fixed interval between status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CALLRELAY";

/// Call relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Outbound stream connection settings
    pub stream: StreamConfig,

    /// Status poller settings
    pub poller: PollerConfig,

    /// Logging settings
    pub logging: LogConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the status API binds to
    pub bind_address: String,

    /// Keep-alive interval for the push stream (milliseconds)
    pub sse_keep_alive_ms: u64,
}

/// Outbound stream connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// WebSocket URL of the external streaming server
    pub url: String,

    /// Delay between a close and the reconnect attempt (milliseconds)
    pub reconnect_delay_ms: u64,

    /// Connection establishment timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Capacity of the transport event channel
    pub channel_capacity: usize,
}

/// Status poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Full URL of the status query endpoint
    pub status_url: String,

    /// Poll interval (milliseconds)
    pub interval_ms: u64,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level directive, e.g. "info" or "debug"
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl RelayConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&RelayConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: RelayConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate().map_err(RelayError::Config)?;
        Ok(config)
    }

    /// Load configuration from environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind_address));
        }

        if self.stream.url.is_empty() {
            return Err("stream.url cannot be empty".to_string());
        }

        match url::Url::parse(&self.stream.url) {
            Ok(url) if url.scheme() == "ws" || url.scheme() == "wss" => {}
            Ok(url) => {
                return Err(format!("stream.url must use ws:// or wss://, got {}://", url.scheme()));
            }
            Err(e) => return Err(format!("Invalid stream.url {}: {}", self.stream.url, e)),
        }

        if self.stream.reconnect_delay_ms == 0 {
            return Err("stream.reconnect_delay_ms must be greater than 0".to_string());
        }

        if self.stream.connect_timeout_ms == 0 {
            return Err("stream.connect_timeout_ms must be greater than 0".to_string());
        }

        if self.stream.channel_capacity == 0 {
            return Err("stream.channel_capacity must be greater than 0".to_string());
        }

        if self.poller.interval_ms == 0 {
            return Err("poller.interval_ms must be greater than 0".to_string());
        }

        if url::Url::parse(&self.poller.status_url).is_err() {
            return Err(format!("Invalid poller.status_url: {}", self.poller.status_url));
        }

        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            poller: PollerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Keep-alive interval for the push stream
    pub fn sse_keep_alive(&self) -> Duration {
        Duration::from_millis(self.sse_keep_alive_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            sse_keep_alive_ms: 15_000,
        }
    }
}

impl StreamConfig {
    /// Delay before a reconnect attempt
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Connection establishment timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/call-state".to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_timeout_ms: 10_000,
            channel_capacity: 100,
        }
    }
}

impl PollerConfig {
    /// Poll interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            status_url: "http://127.0.0.1:3000/api/call-sid".to_string(),
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: 5_000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.poller.interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let mut config = RelayConfig::default();
        config.stream.url = "http://example.com/stream".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("ws://"));
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let mut config = RelayConfig::default();
        config.server.bind_address = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let mut config = RelayConfig::default();
        config.stream.reconnect_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.poller.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("callrelay-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[stream]\nurl = \"wss://stream.example.com/calls\"\n\n[server]\nbind_address = \"0.0.0.0:9000\"").unwrap();

        let config = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(config.stream.url, "wss://stream.example.com/calls");
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        // Untouched keys keep their defaults
        assert_eq!(config.stream.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
