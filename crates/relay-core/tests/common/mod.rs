//! Shared helpers for relay-core integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use callrelay_core::error::{RelayError, Result};
use callrelay_core::transport::{StreamConnector, TransportEvent};

/// What the scripted connector does on one attempt
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Hand back an open connection
    Open,
    /// Refuse the connection
    Fail,
    /// Never finish the handshake
    Hang,
}

/// Connector driven by a script, recording when each attempt happened
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Step>>,
    attempts: Mutex<Vec<Instant>>,
    opened_tx: mpsc::UnboundedSender<mpsc::Sender<TransportEvent>>,
}

impl ScriptedConnector {
    /// Connector that opens every connection
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<mpsc::Sender<TransportEvent>>) {
        Self::with_script(Vec::new())
    }

    /// Connector following `steps`, then opening every further connection
    pub fn with_script(
        steps: Vec<Step>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<mpsc::Sender<TransportEvent>>) {
        let (opened_tx, opened_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(steps.into()),
            attempts: Mutex::new(Vec::new()),
            opened_tx,
        });
        (connector, opened_rx)
    }

    /// When each connection attempt started
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, _url: &Url, _cancel: CancellationToken) -> Result<mpsc::Receiver<TransportEvent>> {
        self.attempts.lock().push(Instant::now());
        let step = self.script.lock().pop_front().unwrap_or(Step::Open);

        match step {
            Step::Open => {
                let (tx, rx) = mpsc::channel(16);
                let _ = self.opened_tx.send(tx);
                Ok(rx)
            }
            Step::Fail => Err(RelayError::transport("connection refused")),
            Step::Hang => {
                std::future::pending::<()>().await;
                Err(RelayError::internal("unreachable"))
            }
        }
    }
}

/// Poll `condition` until it holds, failing the test after a while
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub fn call_started(call_sid: &str) -> TransportEvent {
    TransportEvent::Frame(format!(r#"{{"type":"call_started","callSid":"{}"}}"#, call_sid).into_bytes())
}
