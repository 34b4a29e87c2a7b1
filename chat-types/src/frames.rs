//! Frames exchanged over the persistent connection.
//!
//! Every frame is a flat JSON object with a `type` discriminator naming the
//! event or command kind, plus kind-specific camelCase payload fields. One
//! frame carries exactly one event or command; there is no batching.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{Dialog, DialogId, FileAttachment, FrameError, Message, MessageId, SessionId, Timestamp, UserId};

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundEvent {
    /// A new message in a dialog (possibly one the client has never seen)
    ReceiveMessage(ReceiveMessage),
    /// A message was read by its recipient
    ReadMessage(ReadMessage),
    /// A user went online or offline
    ToggleOnlineStatus(PresenceChanged),
    /// The counterpart started typing
    Typing(TypingSignal),
    /// The counterpart stopped typing
    Untyping(TypingSignal),
    /// A block relation changed
    UserBlocked(UserBlocked),
    /// A session of the local user was terminated
    UserLogout(UserLogout),
    /// A dialog was deleted
    DeleteDialog(DeleteDialog),
    /// The local account was deleted
    DeleteUser(DeleteUser),
}

/// Commands sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundCommand {
    /// Send a text or file message
    SendMessage(SendMessage),
    /// Mark a message as read
    ReadMessage(ReadMessage),
    /// Announce the local user's presence
    ToggleOnlineStatus(SetOnlineStatus),
    /// The local user started typing
    Typing(TypingSignal),
    /// The local user stopped typing
    Untyping(TypingSignal),
    /// Terminate one of the local user's sessions
    DestroySession(DestroySession),
}

/// Payload of `RECEIVE_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessage {
    /// The new message.
    pub message: Message,
    /// Snapshot of the dialog, used when the dialog is not known locally.
    pub dialog: Dialog,
}

/// Payload of `READ_MESSAGE` (both directions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMessage {
    /// Dialog containing the message.
    pub dialog_id: DialogId,
    /// The message that was read.
    pub message_id: MessageId,
}

/// Payload of inbound `TOGGLE_ONLINE_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChanged {
    /// The user whose presence changed.
    pub user_id: UserId,
    /// New presence.
    pub is_online: bool,
    /// Last activity reported by the server.
    #[serde(default)]
    pub last_activity: Option<Timestamp>,
}

/// Payload of outbound `TOGGLE_ONLINE_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOnlineStatus {
    /// Presence to announce.
    pub is_online: bool,
}

/// Payload of `TYPING` / `UNTYPING` (both directions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    /// Dialog the signal applies to.
    pub dialog_id: DialogId,
}

/// Payload of `USER_BLOCKED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBlocked {
    /// The counterpart whose block flag changed.
    pub user_id: UserId,
    /// New block flag.
    pub is_blocked: bool,
}

/// Payload of `USER_LOGOUT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLogout {
    /// The session that was terminated.
    pub session_id: SessionId,
    /// Whether the termination completed normally.
    pub success: bool,
    /// The session that requested the termination.
    #[serde(default)]
    pub current_session_id: Option<SessionId>,
}

/// Payload of `DELETE_DIALOG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDialog {
    /// The deleted dialog.
    pub dialog_id: DialogId,
}

/// Payload of `DELETE_USER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUser {
    /// The deleted account, when the server names it.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Payload of `SEND_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Target dialog.
    pub dialog_id: DialogId,
    /// Text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// File body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
}

/// Payload of `DESTROY_SESSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroySession {
    /// The session to terminate.
    pub session_id: SessionId,
}

/// Discriminator values accepted from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    /// `RECEIVE_MESSAGE`
    ReceiveMessage,
    /// `READ_MESSAGE`
    ReadMessage,
    /// `TOGGLE_ONLINE_STATUS`
    ToggleOnlineStatus,
    /// `TYPING`
    Typing,
    /// `UNTYPING`
    Untyping,
    /// `USER_BLOCKED`
    UserBlocked,
    /// `USER_LOGOUT`
    UserLogout,
    /// `DELETE_DIALOG`
    DeleteDialog,
    /// `DELETE_USER`
    DeleteUser,
}

impl InboundKind {
    /// Every inbound kind, in protocol order.
    pub const ALL: [InboundKind; 9] = [
        InboundKind::ReceiveMessage,
        InboundKind::ReadMessage,
        InboundKind::ToggleOnlineStatus,
        InboundKind::Typing,
        InboundKind::Untyping,
        InboundKind::UserBlocked,
        InboundKind::UserLogout,
        InboundKind::DeleteDialog,
        InboundKind::DeleteUser,
    ];

    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::ReceiveMessage => "RECEIVE_MESSAGE",
            InboundKind::ReadMessage => "READ_MESSAGE",
            InboundKind::ToggleOnlineStatus => "TOGGLE_ONLINE_STATUS",
            InboundKind::Typing => "TYPING",
            InboundKind::Untyping => "UNTYPING",
            InboundKind::UserBlocked => "USER_BLOCKED",
            InboundKind::UserLogout => "USER_LOGOUT",
            InboundKind::DeleteDialog => "DELETE_DIALOG",
            InboundKind::DeleteUser => "DELETE_USER",
        }
    }
}

impl FromStr for InboundKind {
    type Err = FrameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        InboundKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| FrameError::UnknownKind(value.to_string()))
    }
}

impl fmt::Display for InboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator values the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundKind {
    /// `SEND_MESSAGE`
    SendMessage,
    /// `READ_MESSAGE`
    ReadMessage,
    /// `TOGGLE_ONLINE_STATUS`
    ToggleOnlineStatus,
    /// `TYPING`
    Typing,
    /// `UNTYPING`
    Untyping,
    /// `DESTROY_SESSION`
    DestroySession,
}

impl OutboundKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::SendMessage => "SEND_MESSAGE",
            OutboundKind::ReadMessage => "READ_MESSAGE",
            OutboundKind::ToggleOnlineStatus => "TOGGLE_ONLINE_STATUS",
            OutboundKind::Typing => "TYPING",
            OutboundKind::Untyping => "UNTYPING",
            OutboundKind::DestroySession => "DESTROY_SESSION",
        }
    }
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InboundEvent {
    /// Parse and validate a single JSON frame.
    pub fn from_json(frame: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| FrameError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(FrameError::Malformed("frame is not a JSON object".into()));
        }

        let kind = match value.get("type").and_then(Value::as_str) {
            Some(name) => name.parse::<InboundKind>()?,
            None => return Err(FrameError::MissingKind),
        };

        let event: InboundEvent = serde_json::from_value(value)
            .map_err(|e| FrameError::InvalidPayload(format!("{kind}: {e}")))?;

        if let InboundEvent::ReceiveMessage(payload) = &event {
            payload.message.validate()?;
        }

        Ok(event)
    }

    /// The discriminator of this event.
    pub fn kind(&self) -> InboundKind {
        match self {
            InboundEvent::ReceiveMessage(_) => InboundKind::ReceiveMessage,
            InboundEvent::ReadMessage(_) => InboundKind::ReadMessage,
            InboundEvent::ToggleOnlineStatus(_) => InboundKind::ToggleOnlineStatus,
            InboundEvent::Typing(_) => InboundKind::Typing,
            InboundEvent::Untyping(_) => InboundKind::Untyping,
            InboundEvent::UserBlocked(_) => InboundKind::UserBlocked,
            InboundEvent::UserLogout(_) => InboundKind::UserLogout,
            InboundEvent::DeleteDialog(_) => InboundKind::DeleteDialog,
            InboundEvent::DeleteUser(_) => InboundKind::DeleteUser,
        }
    }
}

impl OutboundCommand {
    /// `SEND_MESSAGE` with a text body.
    pub fn send_text(dialog_id: DialogId, text: impl Into<String>) -> Self {
        OutboundCommand::SendMessage(SendMessage {
            dialog_id,
            text: Some(text.into()),
            file: None,
        })
    }

    /// `SEND_MESSAGE` with a file body.
    pub fn send_file(dialog_id: DialogId, file: FileAttachment) -> Self {
        OutboundCommand::SendMessage(SendMessage {
            dialog_id,
            text: None,
            file: Some(file),
        })
    }

    /// `READ_MESSAGE`.
    pub fn read_message(dialog_id: DialogId, message_id: MessageId) -> Self {
        OutboundCommand::ReadMessage(ReadMessage {
            dialog_id,
            message_id,
        })
    }

    /// `TOGGLE_ONLINE_STATUS`.
    pub fn online_status(is_online: bool) -> Self {
        OutboundCommand::ToggleOnlineStatus(SetOnlineStatus { is_online })
    }

    /// `TYPING` when `is_typing`, otherwise `UNTYPING`.
    pub fn typing(dialog_id: DialogId, is_typing: bool) -> Self {
        let signal = TypingSignal { dialog_id };
        if is_typing {
            OutboundCommand::Typing(signal)
        } else {
            OutboundCommand::Untyping(signal)
        }
    }

    /// `DESTROY_SESSION`.
    pub fn destroy_session(session_id: SessionId) -> Self {
        OutboundCommand::DestroySession(DestroySession { session_id })
    }

    /// The discriminator of this command.
    pub fn kind(&self) -> OutboundKind {
        match self {
            OutboundCommand::SendMessage(_) => OutboundKind::SendMessage,
            OutboundCommand::ReadMessage(_) => OutboundKind::ReadMessage,
            OutboundCommand::ToggleOnlineStatus(_) => OutboundKind::ToggleOnlineStatus,
            OutboundCommand::Typing(_) => OutboundKind::Typing,
            OutboundCommand::Untyping(_) => OutboundKind::Untyping,
            OutboundCommand::DestroySession(_) => OutboundKind::DestroySession,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Serialization)
    }
}

/// Decode an inbound frame, dropping anything that is not a valid event.
///
/// Malformed frames and unknown kinds are logged and yield `None`; they are
/// never fatal to the caller.
pub fn decode(frame: &str) -> Option<InboundEvent> {
    match InboundEvent::from_json(frame) {
        Ok(event) => Some(event),
        Err(FrameError::UnknownKind(kind)) => {
            tracing::debug!("Ignoring frame of unknown kind {}", kind);
            None
        }
        Err(e) => {
            tracing::warn!("Dropping inbound frame: {}", e);
            None
        }
    }
}

/// Encode an outbound command as a JSON text frame.
pub fn encode(command: &OutboundCommand) -> Result<String, FrameError> {
    command.to_json()
}
