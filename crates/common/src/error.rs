//! Protocol error types for Room Controller components.

use thiserror::Error;

/// Errors produced while decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not valid JSON or did not match any known message.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The transport delivered a frame type the protocol does not use.
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

/// Result type alias using `ProtocolError`
pub type Result<T> = std::result::Result<T, ProtocolError>;
