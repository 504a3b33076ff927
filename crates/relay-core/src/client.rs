//! Outbound stream client
//!
//! Keeps one connection to the streaming server alive and feeds every frame
//! to the [`EventIngestor`].
//!
//! ```text
//!  Disconnected ──connect()──▶ Connecting ──open──▶ Open ◀─┐ frame
//!       ▲                          │                 │  └──┘
//!       │                      error/timeout       close
//!       │                          ▼                 ▼
//!       └──────── wait reconnect_delay ◀──── Disconnected
//! ```
//!
//! A single supervisor task owns the loop. Every close (or failed handshake)
//! schedules exactly one reconnect after the fixed delay; there is no backoff
//! and no retry ceiling.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::StreamConfig;
use crate::error::{RelayError, Result};
use crate::events::EventIngestor;
use crate::registry::{CallRegistry, ConnectionState};
use crate::transport::{StreamConnector, TransportEvent, WebSocketConnector};

/// Client-side view of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Open,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "disconnected"),
            ClientState::Connecting => write!(f, "connecting"),
            ClientState::Open => write!(f, "open"),
        }
    }
}

/// Outbound stream client
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: StreamConfig,
    connector: Arc<dyn StreamConnector>,
    ingestor: EventIngestor,
    state: Mutex<ClientState>,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    connections_opened: AtomicU64,
}

impl StreamClient {
    /// Create a client using the WebSocket connector
    pub fn new(config: StreamConfig, registry: Arc<CallRegistry>) -> Self {
        let connector = Arc::new(WebSocketConnector::new(Some(config.channel_capacity)));
        Self::with_connector(config, registry, connector)
    }

    /// Create a client with a custom connector
    pub fn with_connector(
        config: StreamConfig,
        registry: Arc<CallRegistry>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                ingestor: EventIngestor::new(registry),
                state: Mutex::new(ClientState::Disconnected),
                shutdown: CancellationToken::new(),
                supervisor: Mutex::new(None),
                connections_opened: AtomicU64::new(0),
            }),
        }
    }

    /// Start connecting to the streaming server
    ///
    /// Never fails: problems are logged. Calling this while a connection is
    /// open, being established, or waiting to reconnect does nothing.
    pub fn connect(&self) {
        if self.inner.shutdown.is_cancelled() {
            warn!("Ignoring connect() on a stream client that was shut down");
            return;
        }

        let url = match parse_stream_url(&self.inner.config.url) {
            Ok(url) => url,
            Err(e) => {
                error!("❌ Cannot create stream connection: {}", e);
                return;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!("❌ Cannot create stream connection outside a Tokio runtime: {}", e);
                return;
            }
        };

        let mut supervisor = self.inner.supervisor.lock();
        if let Some(handle) = supervisor.as_ref() {
            if !handle.is_finished() {
                debug!("Stream client already running ({}), connect() is a no-op", self.state());
                return;
            }
        }

        let inner = self.inner.clone();
        *supervisor = Some(runtime.spawn(async move {
            inner.run(url).await;
        }));
    }

    /// Stop the client, closing the connection and cancelling any pending reconnect
    pub async fn shutdown(&self) {
        info!("🛑 Shutting down stream client");
        self.inner.shutdown.cancel();

        let handle = self.inner.supervisor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Stream supervisor task failed: {}", e);
                }
            }
        }

        *self.inner.state.lock() = ClientState::Disconnected;
        self.inner.ingestor.registry().set_connection_state(ConnectionState::Closed);
        info!("✅ Stream client stopped");
    }

    /// Current client state
    pub fn state(&self) -> ClientState {
        *self.inner.state.lock()
    }

    /// Whether the supervisor task is alive
    pub fn is_running(&self) -> bool {
        self.inner
            .supervisor
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Number of connections that reached the open state
    pub fn connections_opened(&self) -> u64 {
        self.inner.connections_opened.load(Ordering::Relaxed)
    }

    /// Registry fed by this client
    pub fn registry(&self) -> &Arc<CallRegistry> {
        self.inner.ingestor.registry()
    }

    /// Stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }
}

impl ClientInner {
    async fn run(&self, url: Url) {
        loop {
            if let Some(events) = self.open(&url).await {
                self.pump(events).await;
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            let delay = self.config.reconnect_delay();
            info!("🔄 Reconnecting to {} in {:?}", url, delay);
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Pending reconnect to {} cancelled", url);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.mark_disconnected(ConnectionState::Closed);
        debug!("Stream supervisor for {} exited", url);
    }

    /// One connection attempt
    async fn open(&self, url: &Url) -> Option<mpsc::Receiver<TransportEvent>> {
        *self.state.lock() = ClientState::Connecting;
        let registry = self.ingestor.registry();
        let attempt = registry.record_attempt();
        info!("🔌 Connecting to {} (attempt {})", url, attempt);

        let connect_timeout = self.config.connect_timeout();
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            result = timeout(connect_timeout, self.connector.connect(url, self.shutdown.child_token())) => result,
        };

        match result {
            Ok(Ok(events)) => {
                *self.state.lock() = ClientState::Open;
                registry.set_connection_state(ConnectionState::Open);
                self.connections_opened.fetch_add(1, Ordering::Relaxed);
                info!("✅ Connected to {}", url);
                Some(events)
            }
            Ok(Err(e)) => {
                error!("❌ Failed to connect to {}: {}", url, e);
                self.mark_disconnected(ConnectionState::Closed);
                None
            }
            Err(_) => {
                let e = RelayError::timeout(format!("connecting to {} took longer than {:?}", url, connect_timeout));
                error!("⏱️ {}", e);
                self.mark_disconnected(ConnectionState::Closed);
                None
            }
        }
    }

    /// Dispatch events from one open connection until it closes
    async fn pump(&self, mut events: mpsc::Receiver<TransportEvent>) {
        let registry = self.ingestor.registry();

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    registry.set_connection_state(ConnectionState::Closing);
                    break;
                }
                event = events.recv() => event,
            };

            match event {
                Some(TransportEvent::Frame(payload)) => {
                    self.ingestor.ingest_frame(&payload);
                }
                Some(TransportEvent::Error { error }) => {
                    warn!("⚠️ Stream error (waiting for close): {}", error);
                }
                Some(TransportEvent::Closed { reason }) => {
                    info!("🔌 Stream closed: {}", reason.as_deref().unwrap_or("no reason given"));
                    break;
                }
                None => {
                    info!("🔌 Stream closed: transport went away");
                    break;
                }
            }
        }

        self.mark_disconnected(ConnectionState::Closed);
    }

    fn mark_disconnected(&self, connection_state: ConnectionState) {
        *self.state.lock() = ClientState::Disconnected;
        self.ingestor.registry().set_connection_state(connection_state);
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamClient({}, {})", self.inner.config.url, self.state())
    }
}

/// Parse and check a streaming server URL
pub fn parse_stream_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(RelayError::invalid_url(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_url() {
        assert!(parse_stream_url("ws://127.0.0.1:8080/call-state").is_ok());
        assert!(parse_stream_url("wss://relay.example.com").is_ok());
        assert!(matches!(
            parse_stream_url("https://relay.example.com"),
            Err(RelayError::InvalidUrl(_))
        ));
        assert!(parse_stream_url("::nope::").is_err());
    }

    #[test]
    fn test_connect_outside_runtime_does_not_panic() {
        let client = StreamClient::new(StreamConfig::default(), CallRegistry::shared());
        client.connect();
        assert!(!client.is_running());
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_with_bad_url_is_silent() {
        let mut config = StreamConfig::default();
        config.url = "http://not-a-socket".to_string();
        let client = StreamClient::new(config, CallRegistry::shared());
        client.connect();
        assert!(!client.is_running());
        assert_eq!(client.registry().read().diagnostics.attempt_count, 0);
    }
}
