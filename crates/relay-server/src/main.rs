//! `callrelay` binary
//!
//! `callrelay serve` runs the stream client and status API.
//! `callrelay poll` watches a running relay from the client side.

mod cli;

use std::future::Future;
use std::io;

use anyhow::Context;
use callrelay_core::logging::{log_welcome, setup_logging};
use callrelay_core::{CallRelayServer, RelayConfig};
use callrelay_poller::CallSidPoller;
use clap::Parser;
use tracing::{error, info};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RelayConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration after command-line overrides")?;

    setup_logging(cli.logging(&config.logging)?)?;
    log_welcome("callrelay", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { .. } => serve(config).await,
        Command::Poll { .. } => poll(config).await,
    }
}

async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    let server = CallRelayServer::new(config)?;

    let shutdown = server.shutdown_token();
    tokio::spawn(stop_on_signal(tokio::signal::ctrl_c(), move || shutdown.cancel()));

    server.run().await?;
    info!("✅ Call relay stopped");
    Ok(())
}

/// Run `stop` once `signal` fires; a signal that cannot be installed stops nothing
async fn stop_on_signal<S, F>(signal: S, stop: F) -> bool
where
    S: Future<Output = io::Result<()>>,
    F: FnOnce(),
{
    if let Err(e) = signal.await {
        error!("Failed to listen for Ctrl+C, server keeps running: {}", e);
        return false;
    }
    info!("🛑 Received Ctrl+C, shutting down");
    stop();
    true
}

async fn poll(config: RelayConfig) -> anyhow::Result<()> {
    let poller = CallSidPoller::from_config(&config.poller)?;
    let mut updates = poller.subscribe();
    info!("👀 Watching {}", config.poller.status_url);

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C, poller keeps running: {}", e);
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("🛑 Received Ctrl+C, stopping poller");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                match updates.borrow_and_update().as_deref() {
                    Some(call_sid) => println!("active call: {}", call_sid),
                    None => println!("no active call"),
                }
            }
        }
    }

    poller.stop();
    let stats = poller.stats();
    info!(
        "📊 Poller finished: {} polls, {} failures, {} transitions",
        stats.attempts, stats.failures, stats.transitions
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_signal_triggers_stop() {
        let stopped = AtomicBool::new(false);
        let fired = stop_on_signal(async { io::Result::Ok(()) }, || stopped.store(true, Ordering::SeqCst)).await;

        assert!(fired);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_running() {
        let stopped = AtomicBool::new(false);
        let fired = stop_on_signal(
            async { io::Result::Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) },
            || stopped.store(true, Ordering::SeqCst),
        )
        .await;

        assert!(!fired);
        assert!(!stopped.load(Ordering::SeqCst));
    }
}
