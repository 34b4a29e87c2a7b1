//! The dialog/message model.
//!
//! Field names follow the REST payloads (camelCase JSON) so that bulk fetch,
//! history pagination and live frames all decode into the same structs.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DialogId, FrameError, MessageId, SessionId, UserId};

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

fn default_true() -> bool {
    true
}

/// The other participant of a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterpart {
    /// User id of the counterpart.
    pub id: UserId,
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
    /// Avatar URL.
    #[serde(default)]
    pub photo: Option<String>,
    /// Presence; `None` until the server has reported it.
    #[serde(default)]
    pub is_online: Option<bool>,
    /// Last activity; `None` until the server has reported it.
    #[serde(default)]
    pub last_activity: Option<Timestamp>,
    /// Whether the local user has blocked this counterpart.
    #[serde(default)]
    pub is_blocked: bool,
    /// Whether the counterpart is currently typing in this dialog.
    #[serde(default)]
    pub is_typing: bool,
}

impl Counterpart {
    /// Create a counterpart with unknown presence.
    pub fn new(id: impl Into<UserId>, first_name: &str, last_name: &str) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            photo: None,
            is_online: None,
            last_activity: None,
            is_blocked: false,
            is_typing: false,
        }
    }

    /// "First Last", trimmed when either part is empty.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Author reference carried by every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    /// User id of the author.
    pub id: UserId,
    /// Avatar URL of the author.
    #[serde(default)]
    pub photo: Option<String>,
}

/// A file attached to a message, carried inline as base64.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    /// Original file name.
    pub name: String,
    /// Size of the decoded file in bytes.
    pub size: u64,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 (standard alphabet) file contents.
    pub data: String,
}

impl FileAttachment {
    /// Build an attachment from raw file bytes.
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Decode the base64 payload back into bytes.
    pub fn decode_data(&self) -> Result<Vec<u8>, FrameError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| FrameError::InvalidPayload(format!("file data: {e}")))
    }

    /// Whether the attachment is an image (`image/*` MIME type).
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAttachment")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .field("data", &format!("[{} base64 chars]", self.data.len()))
            .finish()
    }
}

/// A single message in a dialog.
///
/// Immutable after creation except for `is_read`, which only ever moves
/// from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned message id.
    pub id: MessageId,
    /// Author of the message.
    pub sender: Sender,
    /// Text body (mutually exclusive with `file`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// File body (mutually exclusive with `text`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileAttachment>,
    /// Whether the recipient has read the message.
    #[serde(default)]
    pub is_read: bool,
    /// When the server accepted the message.
    pub sent_at: Timestamp,
}

impl Message {
    /// Create an unread text message.
    pub fn text(
        id: impl Into<MessageId>,
        sender: impl Into<UserId>,
        text: &str,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            sender: Sender {
                id: sender.into(),
                photo: None,
            },
            text: Some(text.to_string()),
            file: None,
            is_read: false,
            sent_at,
        }
    }

    /// Create an unread file message.
    pub fn file(
        id: impl Into<MessageId>,
        sender: impl Into<UserId>,
        file: FileAttachment,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            sender: Sender {
                id: sender.into(),
                photo: None,
            },
            text: None,
            file: Some(file),
            is_read: false,
            sent_at,
        }
    }

    /// Check that exactly one of `text` or `file` is present.
    pub fn validate(&self) -> Result<(), FrameError> {
        match (&self.text, &self.file) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(FrameError::InvalidPayload(format!(
                "message {} carries both text and file",
                self.id
            ))),
            (None, None) => Err(FrameError::InvalidPayload(format!(
                "message {} has no body",
                self.id
            ))),
        }
    }
}

/// A one-to-one conversation between the local user and one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialog {
    /// Server-assigned dialog id.
    pub id: DialogId,
    /// The other participant.
    pub counterpart: Counterpart,
    /// Messages in conversation order (oldest first).
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Always the last element of `messages` when that is non-empty.
    #[serde(default)]
    pub last_message: Option<Message>,
    /// Number of counterpart messages not yet read.
    #[serde(default)]
    pub unread_count: u32,
    /// Pinned dialogs sort first in the UI.
    #[serde(default)]
    pub is_pinned: bool,
    /// Play a sound for incoming messages.
    #[serde(default = "default_true")]
    pub is_sound_enabled: bool,
    /// Show system notifications for incoming messages.
    #[serde(default = "default_true")]
    pub is_notifications_enabled: bool,
    /// Whether the counterpart has blocked the local user.
    #[serde(default)]
    pub is_me_blocked: bool,
    /// Image gallery: file attachments received in this dialog.
    #[serde(default)]
    pub images: Vec<FileAttachment>,
}

impl Dialog {
    /// Create an empty dialog with default flags.
    pub fn new(id: impl Into<DialogId>, counterpart: Counterpart) -> Self {
        Self {
            id: id.into(),
            counterpart,
            messages: Vec::new(),
            last_message: None,
            unread_count: 0,
            is_pinned: false,
            is_sound_enabled: true,
            is_notifications_enabled: true,
            is_me_blocked: false,
            images: Vec::new(),
        }
    }

    /// Whether the message was authored by this dialog's counterpart.
    pub fn is_from_counterpart(&self, message: &Message) -> bool {
        message.sender.id == self.counterpart.id
    }

    /// Look up a message by id.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Count counterpart messages that are still unread.
    pub fn count_unread(&self) -> u32 {
        let count = self
            .messages
            .iter()
            .filter(|m| !m.is_read && self.is_from_counterpart(m))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Re-derive `last_message` and `unread_count` from `messages`.
    ///
    /// Dialogs fetched without their history keep the server-provided values.
    pub fn normalize(&mut self) {
        if let Some(last) = self.messages.last() {
            self.last_message = Some(last.clone());
            self.unread_count = self.count_unread();
        }
    }

    /// Timestamp of the newest message, if any.
    pub fn last_activity_at(&self) -> Option<Timestamp> {
        self.last_message.as_ref().map(|m| m.sent_at)
    }
}

/// One authenticated session of the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Human-readable device description.
    #[serde(default)]
    pub device: Option<String>,
    /// Last time the session was seen by the server.
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
}
