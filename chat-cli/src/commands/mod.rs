//! CLI command implementations.

pub mod init;
pub mod listen;
pub mod presence;
pub mod send;
pub mod session;
pub mod show_config;

use anyhow::{Context, Result};
use parley_chat_client::{ChatClient, ClientConfig, Delivery, WsTransport};
use parley_chat_core::ConnectionEvent;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// How long a one-shot command waits for the socket to open.
const OPEN_TIMEOUT: Duration = Duration::from_secs(15);

/// Build a WebSocket client from the config.
pub(crate) fn build_client(config: ClientConfig) -> ChatClient<WsTransport> {
    let transport = match config.connect_timeout() {
        Some(timeout) => WsTransport::new().with_connect_timeout(timeout),
        None => WsTransport::new(),
    };
    ChatClient::new(config, transport)
}

/// Connect and wait until the socket is open, for commands that send one
/// frame and exit.
pub(crate) async fn connect_once(config: ClientConfig) -> Result<ChatClient<WsTransport>> {
    let url = config.server_url.clone();
    let client = build_client(config);
    let mut events = client.connection_events();
    client.connect();

    let opened = tokio::time::timeout(OPEN_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Opened) => return Ok(()),
                Ok(ConnectionEvent::Lost {
                    reason, retry_in, ..
                }) => {
                    tracing::warn!("Connection failed ({}), retrying in {:?}", reason, retry_in);
                }
                Ok(ConnectionEvent::CircuitOpen { failures, .. }) => {
                    anyhow::bail!("Giving up after {} failed attempts", failures)
                }
                Ok(ConnectionEvent::Disconnected) => anyhow::bail!("Disconnected"),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => anyhow::bail!("Connection task ended"),
            }
        }
    })
    .await;

    match opened {
        Ok(Ok(())) => Ok(client),
        Ok(Err(e)) => {
            client.shutdown().await;
            Err(e).with_context(|| format!("Could not connect to {}", url))
        }
        Err(_) => {
            client.shutdown().await;
            anyhow::bail!("Timed out connecting to {}", url)
        }
    }
}

/// Fail unless the frame actually went out.
pub(crate) fn ensure_sent(delivery: Delivery, what: &str) -> Result<()> {
    if delivery.is_sent() {
        Ok(())
    } else {
        anyhow::bail!("{} was not delivered: connection lost", what)
    }
}
