//! Command-line arguments for the `callrelay` binary

use std::path::PathBuf;

use callrelay_core::config::LogConfig;
use callrelay_core::logging::LoggingConfig;
use callrelay_core::RelayConfig;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "callrelay")]
#[command(about = "Call-session signaling relay for the CRM dialer")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "CALLRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides logging.level)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub json_logs: bool,

    /// Include source file and line in log lines
    #[arg(long)]
    pub log_file_info: bool,

    /// Log span enter and exit events
    #[arg(long)]
    pub log_spans: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the stream client and the status API
    Serve {
        /// Address to bind the status API to
        #[arg(short, long)]
        bind: Option<String>,

        /// WebSocket URL of the streaming server
        #[arg(long)]
        stream_url: Option<String>,
    },

    /// Poll a running relay and print call changes
    Poll {
        /// Full URL of the status endpoint
        #[arg(long)]
        status_url: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }

        match &self.command {
            Command::Serve { bind, stream_url } => {
                if let Some(bind) = bind {
                    config.server.bind_address = bind.clone();
                }
                if let Some(url) = stream_url {
                    config.stream.url = url.clone();
                }
            }
            Command::Poll {
                status_url,
                interval_ms,
            } => {
                if let Some(url) = status_url {
                    config.poller.status_url = url.clone();
                }
                if let Some(interval_ms) = interval_ms {
                    config.poller.interval_ms = *interval_ms;
                }
            }
        }
    }

    /// Build the log setup from the `[logging]` section and the log flags
    pub fn logging(&self, config: &LogConfig) -> callrelay_core::Result<LoggingConfig> {
        let mut logging = LoggingConfig::from_log_config(config, "callrelay")?;
        if self.json_logs {
            logging = logging.with_json();
        }
        if self.log_file_info {
            logging = logging.with_file_info();
        }
        if self.log_spans {
            logging = logging.with_spans();
        }
        Ok(logging)
    }
}
