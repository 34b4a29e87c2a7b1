//! # chat-types
//!
//! Data model and wire frames for the parley chat sync engine.
//!
//! This crate provides the foundational types used across all parley crates:
//! - [`DialogId`], [`UserId`], [`MessageId`], [`SessionId`] - Identity types
//! - [`Dialog`], [`Message`], [`Counterpart`] - The dialog/message model, shaped
//!   exactly like the REST payloads so bulk fetch and live events share one representation
//! - [`InboundEvent`], [`OutboundCommand`] - Frames exchanged over the persistent connection
//! - [`FrameError`] - Codec errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frames;
mod ids;
mod model;

pub use error::FrameError;
pub use frames::{
    decode, encode, DeleteDialog, DeleteUser, DestroySession, InboundEvent, InboundKind,
    OutboundCommand, OutboundKind, PresenceChanged, ReadMessage, ReceiveMessage, SendMessage,
    SetOnlineStatus, TypingSignal, UserBlocked, UserLogout,
};
pub use ids::{DialogId, MessageId, SessionId, UserId};
pub use model::{Counterpart, Dialog, FileAttachment, Message, Sender, Session, Timestamp};
