//! The frame-source seam.
//!
//! Video acquisition is outside the protocol core: the embedding
//! application supplies something that can produce encoded frames, and
//! the scheduler pulls from it at its own cadence.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::VisageError;

// ── CapturedFrame ────────────────────────────────────────────────

/// One captured, already-encoded video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Media type of `bytes`, e.g. `image/jpeg`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl CapturedFrame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            media_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    /// Render as a `data:` URL for the `FRAME` message.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            BASE64.encode(&self.bytes)
        )
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Supplies encoded frames to the scheduler.
#[async_trait]
pub trait FrameSource: Send {
    /// Whether a capture attempt can currently succeed.
    ///
    /// A not-ready source makes the scheduler skip the tick with no
    /// side effects.
    fn is_ready(&self) -> bool;

    /// Capture exactly one frame.
    async fn capture(&mut self) -> Result<CapturedFrame, VisageError>;
}

// ── Tests ────────────────────────────────────────────────────────
