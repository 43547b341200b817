//! Wire framing for JSON text messages.
//!
//! Each message is a u32 big-endian length prefix followed by that
//! many bytes of UTF-8 JSON. The JSON itself is newline-free (compact
//! encoding), so the prefix is the only framing on the stream.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::VisageError;

/// Upper bound on a single wire message. Frames and visualization
/// artifacts arrive base64-encoded inside JSON, so this is generous.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

#[derive(Debug, Default)]
pub struct WireCodec;

impl tokio_util::codec::Decoder for WireCodec {
    type Item = String;
    type Error = VisageError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX {
            return Ok(None);
        }

        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&src[..LEN_PREFIX]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        if len > MAX_MESSAGE_SIZE {
            return Err(VisageError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        if src.len() < LEN_PREFIX + len {
            src.reserve(LEN_PREFIX + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX);
        let body = src.split_to(len);
        let text = String::from_utf8(body.to_vec())?;
        Ok(Some(text))
    }
}

impl tokio_util::codec::Encoder<String> for WireCodec {
    type Error = VisageError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_MESSAGE_SIZE {
            return Err(VisageError::MessageTooLarge {
                size: item.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        dst.reserve(LEN_PREFIX + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn roundtrip() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(r#"{"type":"NULL"}"#.to_string(), &mut buf)
            .unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, r#"{"type":"NULL"}"#);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_input_returns_none() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        codec.encode("hello world".to_string(), &mut buf).unwrap();

        // Feed the bytes one short of a full frame.
        let full = buf.clone();
        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Length prefix alone is not enough either.
        let mut prefix_only = BytesMut::from(&full[..2]);
        assert!(codec.decode(&mut prefix_only).unwrap().is_none());
    }

    #[test]
    fn two_messages_back_to_back() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        codec.encode("first".to_string(), &mut buf).unwrap();
        codec.encode("second".to_string(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "first");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), "second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversize_frame_rejected() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_MESSAGE_SIZE + 1) as u32);
        buf.extend_from_slice(b"xx");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(VisageError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn oversize_encode_rejected() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        let huge = "x".repeat(MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            codec.encode(huge, &mut buf),
            Err(VisageError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut codec = WireCodec;
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(VisageError::InvalidUtf8(_))
        ));
    }
}
