//! Stream transport abstraction
//!
//! A connector opens one connection to the streaming server and hands back a
//! channel of [`TransportEvent`]s. The connection lives until the connector's
//! reader task sends [`TransportEvent::Closed`] or the cancellation token
//! passed to [`StreamConnector::connect`] fires.

pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;

pub use ws::WebSocketConnector;

/// Events produced by an open stream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A data frame (text or binary payload)
    Frame(Vec<u8>),

    /// A transport error; a `Closed` event follows if the connection dropped
    Error { error: String },

    /// The connection is gone
    Closed { reason: Option<String> },
}

/// Opens connections to the streaming server
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// Open a connection to `url`
    ///
    /// Resolves once the connection is established. Cancelling `cancel`
    /// closes the connection.
    async fn connect(&self, url: &Url, cancel: CancellationToken) -> Result<mpsc::Receiver<TransportEvent>>;
}
