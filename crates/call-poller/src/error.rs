use thiserror::Error;

/// Poller errors
#[derive(Error, Debug)]
pub enum PollerError {
    /// Request could not be sent or the response not read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Unexpected status {0} from status endpoint")]
    Status(u16),

    /// Body was not a status response
    #[error("Decode error: {0}")]
    Decode(String),

    /// Poller configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for poller operations
pub type Result<T> = std::result::Result<T, PollerError>;
