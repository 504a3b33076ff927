//! Call Relay Server
//!
//! Wires the registry, the outbound stream client and the status API into
//! one process with a shared shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{create_router, ApiState};
use crate::client::StreamClient;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::registry::CallRegistry;
use crate::transport::StreamConnector;

/// A complete relay process: stream client plus status API
pub struct CallRelayServer {
    config: RelayConfig,
    registry: Arc<CallRegistry>,
    client: StreamClient,
    shutdown: CancellationToken,
}

impl CallRelayServer {
    /// Create a server with the WebSocket connector
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate().map_err(RelayError::Config)?;
        let registry = CallRegistry::shared();
        let client = StreamClient::new(config.stream.clone(), registry.clone());
        Ok(Self::assemble(config, registry, client))
    }

    /// Create a server with a custom stream connector
    pub fn with_connector(config: RelayConfig, connector: Arc<dyn StreamConnector>) -> Result<Self> {
        config.validate().map_err(RelayError::Config)?;
        let registry = CallRegistry::shared();
        let client = StreamClient::with_connector(config.stream.clone(), registry.clone(), connector);
        Ok(Self::assemble(config, registry, client))
    }

    fn assemble(config: RelayConfig, registry: Arc<CallRegistry>, client: StreamClient) -> Self {
        Self {
            config,
            registry,
            client,
            shutdown: CancellationToken::new(),
        }
    }

    /// Shared registry
    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Outbound stream client
    pub fn client(&self) -> &StreamClient {
        &self.client
    }

    /// Server configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Router serving the status API for this server
    pub fn router(&self) -> Router {
        let state = ApiState::new(self.registry.clone())
            .with_keep_alive(self.config.server.sse_keep_alive())
            .with_shutdown(self.shutdown.clone());
        create_router(state)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request a graceful stop
    pub fn stop(&self) {
        info!("🛑 Stopping call relay server...");
        self.shutdown.cancel();
    }

    /// Bind the configured address and serve until stopped
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .server
            .bind_address
            .parse()
            .map_err(|e| RelayError::config(format!("Invalid bind address {}: {}", self.config.server.bind_address, e)))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until stopped
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        self.display_info(local_addr);

        self.client.connect();

        let shutdown = self.shutdown.clone();
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        self.client.shutdown().await;
        served?;

        info!("✅ Call relay server stopped");
        Ok(())
    }

    fn display_info(&self, local_addr: SocketAddr) {
        info!("📞 Call relay listening on http://{}", local_addr);
        info!("   Stream endpoint: {}", self.config.stream.url);
        info!("   Reconnect delay: {:?}", self.config.stream.reconnect_delay());
        info!("   Status API:      http://{}/api/call-sid", local_addr);
        info!("   Push stream:     http://{}/api/call-sid/stream", local_addr);
    }
}
