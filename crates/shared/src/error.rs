//! Shared error types for frame parsing and event decoding.

use thiserror::Error;

/// A text message that is not a valid channel frame.
#[derive(Debug, Error)]
#[error("invalid channel frame: {0}")]
pub struct FrameError(#[from] serde_json::Error);

/// Why a `"change"` payload was dropped.
///
/// None of these are fatal for the connection; the event is logged and
/// ignored.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload has no `body` object")]
    MissingBody,
    #[error("body has no `object` object")]
    MissingObject,
    #[error("body has no `data` object")]
    MissingData,
    #[error("message data did not decode: {0}")]
    Message(serde_json::Error),
}
