//! Domain-specific error types for the visage protocol client.
//!
//! All fallible operations return `Result<T, VisageError>`.
//! No panics on invalid input — every error is typed and recoverable.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the visage client.
#[derive(Debug, Error)]
pub enum VisageError {
    // ── Framing Errors ───────────────────────────────────────────
    /// A wire frame exceeds the configured maximum size.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A wire frame did not contain valid UTF-8 text.
    #[error("invalid utf-8 in message frame: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Protocol Errors ──────────────────────────────────────────
    /// An inbound message could not be parsed into a known shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The `type` discriminant did not map to any known message kind.
    #[error("unknown message type: {0:?}")]
    UnknownType(String),

    /// An operation violated the calibration sequencing rules.
    #[error("calibration error: {0}")]
    Calibration(&'static str),

    /// A lifecycle transition was requested from the wrong phase.
    #[error("invalid phase transition: {0}")]
    Transition(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Application Errors ───────────────────────────────────────
    /// The frame source failed to produce a frame.
    #[error("capture error: {0}")]
    Capture(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for VisageError {
    fn from(s: String) -> Self {
        VisageError::Other(s)
    }
}

impl From<&str> for VisageError {
    fn from(s: &str) -> Self {
        VisageError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for VisageError {
    fn from(e: serde_json::Error) -> Self {
        VisageError::Malformed(e.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VisageError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VisageError::ChannelClosed
    }
}
