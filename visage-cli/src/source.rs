//! Frame sources for the terminal client.
//!
//! Real camera capture is outside this binary's remit; it replays
//! already-encoded frames from a directory, or falls back to a tiny
//! built-in test pattern so the protocol can be exercised with no
//! assets at all.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use visage_core::{CapturedFrame, FrameSource, VisageError};

/// A 1×1 transparent GIF, for when no frame directory is configured.
const TEST_PATTERN_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

/// Cycles through a fixed set of encoded frames.
pub struct ReplayFrameSource {
    frames: Vec<CapturedFrame>,
    next: usize,
}

impl ReplayFrameSource {
    /// Load every regular file in `dir` (sorted by name) as one frame.
    pub fn from_dir(dir: &Path, media_type: &str) -> io::Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            frames.push(CapturedFrame {
                media_type: media_type.to_string(),
                bytes: std::fs::read(&path)?,
            });
        }
        Ok(Self { frames, next: 0 })
    }

    /// The built-in single-frame test pattern.
    pub fn test_pattern() -> Self {
        Self {
            frames: vec![CapturedFrame {
                media_type: "image/gif".to_string(),
                bytes: TEST_PATTERN_GIF.to_vec(),
            }],
            next: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameSource for ReplayFrameSource {
    fn is_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    async fn capture(&mut self) -> Result<CapturedFrame, VisageError> {
        if self.frames.is_empty() {
            return Err(VisageError::Capture("no frames loaded".to_string()));
        }
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }
}

// ── Tests ────────────────────────────────────────────────────────
