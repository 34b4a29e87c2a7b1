//! Error types for the frame codec.

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame is not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame has no string `type` discriminator.
    #[error("frame has no type discriminator")]
    MissingKind,

    /// The discriminator names no known event kind.
    #[error("unknown frame kind: {0}")]
    UnknownKind(String),

    /// The discriminator is known but the payload does not match it.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}
