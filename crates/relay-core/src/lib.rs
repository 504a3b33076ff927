//! # Call Relay Core
//!
//! Call-session signaling relay for the cold-calling CRM.
//!
//! An external streaming server announces the active call over a persistent
//! WebSocket. This crate keeps that connection alive, records the current
//! call identifier in a shared registry, and serves it to dashboard clients
//! over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! streaming server ──▶ StreamClient ──▶ EventIngestor ──▶ CallRegistry
//!                                                             │
//!                      dashboard ◀── status API (poll / SSE) ◀┘
//! ```
//!
//! - [`client`]: outbound connection with fixed-delay reconnect
//! - [`events`]: frame classification and the status webhook
//! - [`registry`]: the single call slot and connection diagnostics
//! - [`api`]: axum router for the status, push and webhook endpoints
//! - [`server`]: process wiring and graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callrelay_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     let server = CallRelayServer::new(config)?;
//!     server.run().await
//! }
//! ```

// Core modules
pub mod error;
pub mod config;
pub mod logging;

// Relay functionality
pub mod registry;
pub mod events;
pub mod transport;
pub mod client;

// External interfaces
pub mod api;
pub mod server;

pub use error::{RelayError, Result};
pub use config::RelayConfig;
pub use registry::{CallRegistry, ConnectionDiagnostics, ConnectionState, RegistrySnapshot};
pub use events::{EventIngestor, IngestOutcome};
pub use client::{ClientState, StreamClient};
pub use server::CallRelayServer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallRegistry, CallRelayServer, ClientState, ConnectionState, EventIngestor, IngestOutcome,
        RelayConfig, RelayError, Result, StreamClient,
    };

    pub use crate::api::{create_router, ApiState, CallSidResponse};
    pub use crate::config::{LogConfig, PollerConfig, ServerConfig, StreamConfig};
    pub use crate::events::{CallStatus, CallStatusWebhook};
    pub use crate::transport::{StreamConnector, TransportEvent, WebSocketConnector};
}
