//! # chat-core
//!
//! Pure logic for the parley chat sync engine (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for keeping a
//! local dialog collection consistent with the server, without any network
//! or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`ConnectionState`] consumes lifecycle events and returns actions
//! - [`ChatState`] applies inbound events and returns effects
//! - [`chunk_text`] splits oversized outgoing text
//!
//! The actual I/O (socket, timers, notifications) is performed by
//! `chat-client`, which interprets the returned actions and effects.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod chunk;
pub mod dispatch;
pub mod state;
pub mod store;

pub use backoff::ReconnectPolicy;
pub use chunk::{chunk_text, MAX_CHUNK_CHARS};
pub use dispatch::dispatch;
pub use state::{Action, ConnectionEvent, ConnectionState, Event};
pub use store::{ChatState, Effect, NotificationSettings};
