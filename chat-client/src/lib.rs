//! # chat-client
//!
//! Client library for the parley chat sync engine.
//!
//! This is the main library that applications use to stay in sync with the
//! chat server.
//!
//! ## Features
//!
//! - **Single Persistent Connection**: reconnects with exponential backoff,
//!   jitter and a circuit breaker
//! - **Canonical Dialog Store**: inbound frames are reconciled into
//!   [`ChatState`](parley_chat_core::ChatState) one at a time
//! - **Outbound Commands**: send, typing, read receipts, presence, session
//!   teardown; long text is chunked automatically
//! - **Transport Abstraction**: Pluggable transport layer (WebSocket, mock)
//!
//! ## Example
//!
//! ```ignore
//! use parley_chat_client::{ChatClient, ClientConfig, WsTransport};
//!
//! let config = ClientConfig::new("wss://chat.example.com/ws", "u-42");
//! let client = ChatClient::new(config, WsTransport::new());
//!
//! client.connect();
//! let mut events = client.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod connection;
pub mod transport;

pub use client::{ChatClient, ClientError, ClientEvent};
pub use config::{ClientConfig, ReconnectConfig};
pub use connection::{ConnectionManager, Delivery, FrameHandler, HandlerFlow, OnOpen};
pub use transport::{MockTransport, Transport, TransportError, WsTransport};
