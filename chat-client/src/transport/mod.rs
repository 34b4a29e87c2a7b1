//! Transport abstraction for parley.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying socket (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` opens the socket
//! - `send()` transmits one text frame
//! - `recv()` waits for the next text frame
//! - `close()` gracefully terminates
//!
//! A transport holds at most one socket. Connecting again replaces it; the
//! connection manager closes the old one first.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.connect("wss://chat.example.com/ws").await?;
//! transport.send(r#"{"type":"TOGGLE_ONLINE_STATUS","isOnline":true}"#).await?;
//! let frame = transport.recv().await?;
//! ```

mod mock;
mod websocket;

pub use mock::MockTransport;
pub use websocket::WsTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Transport trait for exchanging JSON text frames with the chat server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a socket to the given URL.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Waits until a frame is available or the socket closes.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if a socket is currently open.
    fn is_connected(&self) -> bool;

    /// Close the socket gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
