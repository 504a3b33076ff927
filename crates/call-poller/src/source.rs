//! Where the poller reads status from

use std::time::Duration;

use async_trait::async_trait;
use callrelay_core::api::CallSidResponse;
use tracing::trace;

use crate::error::{PollerError, Result};

/// A readable status endpoint
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    /// Fetch the current status once
    async fn fetch(&self) -> Result<CallSidResponse>;
}

/// Status endpoint reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    /// Create a source for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PollerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<CallSidResponse> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollerError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        trace!("Status body from {}: {} bytes", self.url, bytes.len());
        serde_json::from_slice(&bytes).map_err(|e| PollerError::Decode(e.to_string()))
    }
}
