//! End-to-end tests against a local WebSocket server

mod common;

use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use callrelay_core::prelude::*;
use common::{wait_until, ScriptedConnector};

fn test_config(url: String) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.stream.url = url;
    config.stream.reconnect_delay_ms = 200;
    config.stream.connect_timeout_ms = 2_000;
    config
}

#[tokio::test]
async fn test_websocket_frames_reach_registry_and_reconnect_after_close() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        // First connection: announce a call, then close
        let (tcp, _) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        ws.send(Message::Text("garbage".to_string())).await?;
        ws.send(Message::Text(r#"{"type":"call_started","callSid":"CA-live"}"#.to_string())).await?;
        ws.close(None).await?;

        // Second connection: stay open until the client leaves
        let (tcp, _) = listener.accept().await?;
        let mut ws = accept_async(tcp).await?;
        ws.send(Message::Binary(br#"{"type":"heartbeat"}"#.to_vec())).await?;
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        anyhow::Ok(())
    });

    let config = test_config(format!("ws://{}/call-state", addr));
    let registry = CallRegistry::shared();
    let client = StreamClient::new(config.stream.clone(), registry.clone());
    client.connect();

    wait_until(|| registry.call_sid().as_deref() == Some("CA-live")).await;
    wait_until(|| registry.read().diagnostics.attempt_count == 2 && client.state() == ClientState::Open).await;
    wait_until(|| registry.read().diagnostics.message_count == 3).await;
    assert_eq!(registry.call_sid().as_deref(), Some("CA-live"));

    client.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), server).await???;
    Ok(())
}

#[tokio::test]
async fn test_refused_connection_keeps_retrying() -> Result<()> {
    // Reserve a port, then free it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let config = test_config(format!("ws://{}/", addr));
    let registry = CallRegistry::shared();
    let client = StreamClient::new(config.stream.clone(), registry.clone());
    client.connect();

    wait_until(|| registry.read().diagnostics.attempt_count >= 3).await;
    assert_eq!(registry.call_sid(), None);
    assert!(client.is_running());

    client.shutdown().await;
    assert_eq!(registry.connection_state(), ConnectionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_server_serves_and_stops() -> Result<()> {
    let (connector, mut opened) = ScriptedConnector::new();
    let server = std::sync::Arc::new(CallRelayServer::with_connector(
        test_config("ws://127.0.0.1:1/unused".to_string()),
        connector.clone(),
    )?);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let running = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await })
    };

    let conn = opened.recv().await.expect("client should connect on start");
    conn.send(common::call_started("CA-srv")).await?;
    wait_until(|| server.registry().call_sid().as_deref() == Some("CA-srv")).await;

    server.stop();
    tokio::time::timeout(Duration::from_secs(5), running).await???;
    assert!(!server.client().is_running());
    assert_eq!(connector.attempts().len(), 1);
    Ok(())
}
