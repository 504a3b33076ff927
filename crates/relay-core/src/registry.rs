//! Call state registry
//!
//! One slot for the current call identifier plus the diagnostics of the
//! outbound stream connection. Every mutation happens under a single lock so
//! a snapshot never mixes values from two different updates.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

/// Lifecycle of the underlying stream socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No connection has been attempted yet
    Null,
    /// Handshake in progress
    Connecting,
    /// Connected and receiving frames
    Open,
    /// Tearing down
    Closing,
    /// Closed, a reconnect may be pending
    Closed,
}

impl ConnectionState {
    /// Label reported by the status endpoint
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Null => "NULL",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stream connection diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDiagnostics {
    pub state: ConnectionState,
    /// Connection attempts since process start
    pub attempt_count: u64,
    /// Inbound frames since process start
    pub message_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Default for ConnectionDiagnostics {
    fn default() -> Self {
        Self {
            state: ConnectionState::Null,
            attempt_count: 0,
            message_count: 0,
            last_message_at: None,
        }
    }
}

/// Consistent view of the registry at one instant
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub call_sid: Option<String>,
    /// When the call identifier was last written
    pub last_updated: DateTime<Utc>,
    pub diagnostics: ConnectionDiagnostics,
    /// When this snapshot was taken
    pub read_at: DateTime<Utc>,
}

struct RegistryState {
    call_sid: Option<String>,
    last_updated: DateTime<Utc>,
    diagnostics: ConnectionDiagnostics,
}

/// Shared call state registry
///
/// Cheap to share through `Arc`; all methods take `&self`.
pub struct CallRegistry {
    state: RwLock<RegistryState>,
    call_sid_tx: watch::Sender<Option<String>>,
}

impl CallRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (call_sid_tx, _) = watch::channel(None);
        Self {
            state: RwLock::new(RegistryState {
                call_sid: None,
                last_updated: Utc::now(),
                diagnostics: ConnectionDiagnostics::default(),
            }),
            call_sid_tx,
        }
    }

    /// Create an empty registry behind an `Arc`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Take a consistent snapshot of the call identifier and diagnostics
    pub fn read(&self) -> RegistrySnapshot {
        let state = self.state.read();
        RegistrySnapshot {
            call_sid: state.call_sid.clone(),
            last_updated: state.last_updated,
            diagnostics: state.diagnostics.clone(),
            read_at: Utc::now(),
        }
    }

    /// Current call identifier
    pub fn call_sid(&self) -> Option<String> {
        self.state.read().call_sid.clone()
    }

    /// Overwrite the current call identifier, returning the one it replaced
    pub fn write_call_sid(&self, call_sid: impl Into<String>) -> Option<String> {
        let call_sid = call_sid.into();
        let previous = {
            let mut state = self.state.write();
            Self::replace_call_sid(&mut state, &call_sid)
        };
        self.publish_call_sid(call_sid, previous.as_deref());
        previous
    }

    /// Count an inbound frame and apply the call identifier it carries
    ///
    /// Both changes happen under one lock, so a reader never sees the frame
    /// counted without its call identifier. Returns the new message count
    /// and the identifier that was replaced.
    pub fn record_frame(&self, call_sid: Option<&str>) -> (u64, Option<String>) {
        let (count, previous) = {
            let mut state = self.state.write();
            state.diagnostics.message_count += 1;
            state.diagnostics.last_message_at = Some(Utc::now());
            let previous = call_sid.and_then(|call_sid| Self::replace_call_sid(&mut state, call_sid));
            (state.diagnostics.message_count, previous)
        };

        if let Some(call_sid) = call_sid {
            self.publish_call_sid(call_sid.to_string(), previous.as_deref());
        }
        (count, previous)
    }

    fn replace_call_sid(state: &mut RegistryState, call_sid: &str) -> Option<String> {
        state.last_updated = Utc::now();
        state.call_sid.replace(call_sid.to_string())
    }

    fn publish_call_sid(&self, call_sid: String, previous: Option<&str>) {
        match previous {
            Some(prev) if prev != call_sid => {
                info!("📞 Call SID updated: {} -> {}", prev, call_sid);
            }
            Some(_) => debug!("Call SID rewritten with same value: {}", call_sid),
            None => info!("📞 Call SID set: {}", call_sid),
        }
        self.call_sid_tx.send_replace(Some(call_sid));
    }

    /// Count a connection attempt and mark the state as connecting
    ///
    /// Returns the attempt number.
    pub fn record_attempt(&self) -> u64 {
        let mut state = self.state.write();
        state.diagnostics.attempt_count += 1;
        state.diagnostics.state = ConnectionState::Connecting;
        state.diagnostics.attempt_count
    }

    /// Mirror the socket lifecycle state
    pub fn set_connection_state(&self, connection_state: ConnectionState) {
        let mut state = self.state.write();
        if state.diagnostics.state != connection_state {
            debug!("Stream connection state: {} -> {}", state.diagnostics.state, connection_state);
            state.diagnostics.state = connection_state;
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.read().diagnostics.state
    }

    /// Count an inbound frame
    ///
    /// The count and timestamp change together. Returns the new count.
    pub fn record_message(&self) -> u64 {
        self.record_frame(None).0
    }

    /// Subscribe to call identifier changes
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.call_sid_tx.subscribe()
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CallRegistry")
            .field("call_sid", &state.call_sid)
            .field("diagnostics", &state.diagnostics)
            .finish()
    }
}
