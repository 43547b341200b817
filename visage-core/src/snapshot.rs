//! Client-side state: stored face crops, identity labels, training flag.
//!
//! The snapshot is everything the client knows that a freshly connected
//! server does not. It is mutated by the message dispatcher (server-driven
//! additions) and by local edit operations; the frame scheduler only reads
//! the active identity. The whole structure is pushed to the server as one
//! `ALL_STATE` message after every calibration.

use serde::{Deserialize, Serialize};

use crate::error::VisageError;
use crate::message::Identity;

/// Side length of the aligned face crops produced by the recognizer.
pub const FACE_CROP_DIM: u32 = 96;

// ── PixelBuffer ──────────────────────────────────────────────────

/// A decoded, displayable RGBA8 image.
///
/// The server ships face crops as raw BGR triples; we convert them to
/// RGBA on receipt so the render sink never has to care about channel
/// order. On the wire (inside `ALL_STATE`) the pixel bytes travel as
/// base64 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    pub rgba: Vec<u8>,
}

impl PixelBuffer {
    /// Decode a raw BGR face crop into RGBA.
    ///
    /// The payload must be exactly `FACE_CROP_DIM²` BGR triples.
    pub fn from_bgr(content: &[u8]) -> Result<Self, VisageError> {
        let expected = (FACE_CROP_DIM * FACE_CROP_DIM * 3) as usize;
        if content.len() != expected {
            return Err(VisageError::Malformed(format!(
                "pixel payload is {} bytes, expected {expected}",
                content.len()
            )));
        }

        let mut rgba = Vec::with_capacity((FACE_CROP_DIM * FACE_CROP_DIM * 4) as usize);
        for px in content.chunks_exact(3) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], 0xFF]);
        }
        Ok(Self {
            width: FACE_CROP_DIM,
            height: FACE_CROP_DIM,
            rgba,
        })
    }
}

/// Serde helper: `Vec<u8>` as base64 text.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        BASE64.decode(text).map_err(serde::de::Error::custom)
    }
}

// ── ImageRecord ──────────────────────────────────────────────────

/// One stored face crop with its label and embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Server-assigned content hash; unique across the snapshot.
    pub hash: String,
    /// Current label; relabelled locally via `UPDATE_IDENTITY`.
    pub identity: Identity,
    /// Decoded displayable pixels.
    pub image: PixelBuffer,
    /// The recognizer's embedding for this crop.
    pub representation: Vec<f64>,
}

// ── SnapshotSummary ──────────────────────────────────────────────

/// Lightweight view of the snapshot for render-sink notifications.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSummary {
    pub people: Vec<String>,
    pub image_count: usize,
    pub training: bool,
}

// ── ClientSnapshot ───────────────────────────────────────────────

/// Everything the client knows: stored images, identity labels, and
/// whether training mode is on.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    images: Vec<ImageRecord>,
    people: Vec<String>,
    training: bool,
}

impl ClientSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn people(&self) -> &[String] {
        &self.people
    }

    pub fn training(&self) -> bool {
        self.training
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Register a new identity label, returning its index.
    pub fn add_person(&mut self, label: String) -> usize {
        self.people.push(label);
        self.people.len() - 1
    }

    /// Append a server-pushed image.
    ///
    /// Returns `false` (no mutation) when the hash is already stored —
    /// hashes are unique across the snapshot.
    pub fn add_image(&mut self, record: ImageRecord) -> bool {
        if self.find_image(&record.hash).is_some() {
            return false;
        }
        self.images.push(record);
        true
    }

    /// Remove a stored image by hash. Returns whether anything was removed.
    pub fn remove_image(&mut self, hash: &str) -> bool {
        match self.images.iter().position(|img| img.hash == hash) {
            Some(idx) => {
                self.images.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Relabel a stored image by hash. Returns whether anything changed.
    pub fn update_identity(&mut self, hash: &str, identity: Identity) -> bool {
        match self.images.iter_mut().find(|img| img.hash == hash) {
            Some(img) => {
                img.identity = identity;
                true
            }
            None => false,
        }
    }

    pub fn find_image(&self, hash: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|img| img.hash == hash)
    }

    /// Resolve an identity reference to its display label.
    pub fn label_for(&self, identity: Identity) -> String {
        match identity {
            Identity::Known(idx) => self
                .people
                .get(idx)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            Identity::Unknown => "Unknown".to_string(),
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            people: self.people.clone(),
            image_count: self.images.len(),
            training: self.training,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> ImageRecord {
        ImageRecord {
            hash: hash.to_string(),
            identity: Identity::Unknown,
            image: PixelBuffer {
                width: 2,
                height: 1,
                rgba: vec![0; 8],
            },
            representation: vec![0.5; 4],
        }
    }

    #[test]
    fn bgr_payload_converts_to_rgba() {
        let mut content = vec![0u8; (FACE_CROP_DIM * FACE_CROP_DIM * 3) as usize];
        // First pixel: B=10, G=20, R=30.
        content[0] = 10;
        content[1] = 20;
        content[2] = 30;

        let buf = PixelBuffer::from_bgr(&content).unwrap();
        assert_eq!(buf.width, FACE_CROP_DIM);
        assert_eq!(buf.height, FACE_CROP_DIM);
        assert_eq!(buf.rgba.len(), (FACE_CROP_DIM * FACE_CROP_DIM * 4) as usize);
        assert_eq!(&buf.rgba[..4], &[30, 20, 10, 0xFF]);
    }

    #[test]
    fn wrong_size_payload_rejected() {
        assert!(PixelBuffer::from_bgr(&[1, 2, 3]).is_err());
    }

    #[test]
    fn pixel_bytes_serialize_as_base64() {
        let buf = PixelBuffer {
            width: 1,
            height: 1,
            rgba: vec![1, 2, 3, 255],
        };
        let value = serde_json::to_value(&buf).unwrap();
        assert_eq!(value["rgba"], serde_json::json!("AQID/w=="));

        let back: PixelBuffer = serde_json::from_value(value).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn duplicate_hash_rejected() {
        let mut snap = ClientSnapshot::new();
        assert!(snap.add_image(record("abc")));
        assert!(!snap.add_image(record("abc")));
        assert_eq!(snap.images().len(), 1);
    }

    #[test]
    fn remove_image_by_hash() {
        let mut snap = ClientSnapshot::new();
        snap.add_image(record("abc"));
        assert!(snap.remove_image("abc"));
        assert!(snap.find_image("abc").is_none());
        // Second removal is a no-op.
        assert!(!snap.remove_image("abc"));
    }

    #[test]
    fn update_identity_by_hash() {
        let mut snap = ClientSnapshot::new();
        snap.add_person("alice".to_string());
        snap.add_image(record("abc"));

        assert!(snap.update_identity("abc", Identity::Known(0)));
        assert_eq!(snap.find_image("abc").unwrap().identity, Identity::Known(0));
        assert!(!snap.update_identity("nope", Identity::Known(0)));
    }

    #[test]
    fn add_person_returns_index() {
        let mut snap = ClientSnapshot::new();
        assert_eq!(snap.add_person("alice".to_string()), 0);
        assert_eq!(snap.add_person("bob".to_string()), 1);
    }

    #[test]
    fn label_resolution() {
        let mut snap = ClientSnapshot::new();
        snap.add_person("alice".to_string());
        assert_eq!(snap.label_for(Identity::Known(0)), "alice");
        assert_eq!(snap.label_for(Identity::Unknown), "Unknown");
        // Out-of-range index degrades to Unknown rather than panicking.
        assert_eq!(snap.label_for(Identity::Known(9)), "Unknown");
    }

    #[test]
    fn summary_reflects_state() {
        let mut snap = ClientSnapshot::new();
        snap.add_person("alice".to_string());
        snap.add_image(record("abc"));
        snap.set_training(true);

        let s = snap.summary();
        assert_eq!(s.people, vec!["alice".to_string()]);
        assert_eq!(s.image_count, 1);
        assert!(s.training);
    }
}
