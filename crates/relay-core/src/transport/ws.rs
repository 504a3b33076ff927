use std::fmt;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Result;
use crate::transport::{StreamConnector, TransportEvent};

// Default channel capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// WebSocket connector for the streaming server
#[derive(Clone)]
pub struct WebSocketConnector {
    channel_capacity: usize,
}

impl WebSocketConnector {
    /// Create a connector whose event channels hold `channel_capacity` events
    pub fn new(channel_capacity: Option<usize>) -> Self {
        Self {
            channel_capacity: channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, url: &Url, cancel: CancellationToken) -> Result<mpsc::Receiver<TransportEvent>> {
        let (ws_stream, response) = connect_async(url.as_str()).await?;
        debug!("WebSocket handshake with {} completed: {}", url, response.status());

        let (events_tx, events_rx) = mpsc::channel(self.channel_capacity);
        let (mut sink, mut stream) = ws_stream.split();
        let peer = url.to_string();

        // Reader task: forwards frames until the socket or the owner goes away
        tokio::spawn(async move {
            let reason = loop {
                let message = tokio::select! {
                    _ = cancel.cancelled() => {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!("Error sending close frame to {}: {}", peer, e);
                        }
                        break Some("closed by client".to_string());
                    }
                    message = stream.next() => message,
                };

                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!("Received text frame from {}: {}", peer, text);
                        if events_tx.send(TransportEvent::Frame(text.into_bytes())).await.is_err() {
                            break Some("event receiver dropped".to_string());
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        trace!("Received binary frame from {} ({} bytes)", peer, data.len());
                        if events_tx.send(TransportEvent::Frame(data)).await.is_err() {
                            break Some("event receiver dropped".to_string());
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        trace!("Control frame from {}", peer);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Server closed stream {}: {:?}", peer, frame);
                        break frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", peer, e);
                        let _ = events_tx
                            .send(TransportEvent::Error {
                                error: e.to_string(),
                            })
                            .await;
                        break Some(e.to_string());
                    }
                    None => break None,
                }
            };

            if let Err(e) = events_tx.send(TransportEvent::Closed { reason }).await {
                debug!("Close event for {} not delivered: {}", peer, e);
            }
        });

        Ok(events_rx)
    }
}

impl fmt::Debug for WebSocketConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebSocketConnector(capacity={})", self.channel_capacity)
    }
}
