//! STX/ETX length-prefixed framing.
//!
//! ```text
//! 0x02 | u32 little-endian body length | UTF-8 JSON body | 0x03
//! ```

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
/// STX plus the length field.
pub const HEADER_LEN: usize = 5;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Keepalive bodies.
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame length {len} (max {max})")]
    InvalidLength { len: usize, max: usize },
    #[error("frame end marker missing (found 0x{found:02x})")]
    MissingEndMarker { found: u8 },
    #[error("frame body is not valid UTF-8")]
    InvalidUtf8,
}

/// Stateless encoder/decoder over a `BytesMut` read buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn encode(&self, body: &str, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = body.len();
        if len == 0 || len > self.max_frame_bytes {
            return Err(FrameError::InvalidLength {
                len,
                max: self.max_frame_bytes,
            });
        }
        dst.reserve(HEADER_LEN + len + 1);
        dst.put_u8(STX);
        dst.put_u32_le(len as u32);
        dst.put_slice(body.as_bytes());
        dst.put_u8(ETX);
        Ok(())
    }

    /// Take one complete frame off the front of `src`.
    ///
    /// Bytes before the next STX are discarded. `Ok(None)` means more input
    /// is needed. On error the offending STX has been consumed, so calling
    /// again resynchronizes on the next one.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        match src.iter().position(|b| *b == STX) {
            Some(0) => {}
            Some(skip) => {
                log::debug!("Discarding {} bytes before frame start", skip);
                src.advance(skip);
            }
            None => {
                src.clear();
                return Ok(None);
            }
        }

        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len == 0 || len > self.max_frame_bytes {
            src.advance(1);
            return Err(FrameError::InvalidLength {
                len,
                max: self.max_frame_bytes,
            });
        }

        let total = HEADER_LEN + len + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let found = src[total - 1];
        if found != ETX {
            src.advance(1);
            return Err(FrameError::MissingEndMarker { found });
        }

        src.advance(HEADER_LEN);
        let body = src.split_to(len);
        src.advance(1);
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|_| FrameError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(body: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::default().encode(body, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_layout() {
        let buf = encoded("{}");
        assert_eq!(&buf[..], &[STX, 2, 0, 0, 0, b'{', b'}', ETX]);
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let codec = FrameCodec::default();
        let full = encoded(r#"{"command":"get_schema"}"#);
        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
        partial.extend_from_slice(&full[full.len() - 3..]);
        assert_eq!(
            codec.decode(&mut partial).unwrap().as_deref(),
            Some(r#"{"command":"get_schema"}"#)
        );
        assert!(partial.is_empty());
    }

    #[test]
    fn test_decode_two_frames_and_garbage() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"noise"[..]);
        buf.extend_from_slice(&encoded(PING));
        buf.extend_from_slice(&encoded("second"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(PING));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("second"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let codec = FrameCodec::new(4);
        let mut out = BytesMut::new();
        assert!(matches!(
            codec.encode("too long", &mut out),
            Err(FrameError::InvalidLength { len: 8, max: 4 })
        ));

        let mut buf = encoded("too long");
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_missing_end_marker_then_resync() {
        let codec = FrameCodec::default();
        let mut bad = encoded("abc");
        let last = bad.len() - 1;
        bad[last] = b'x';
        bad.extend_from_slice(&encoded(PONG));

        assert_eq!(
            codec.decode(&mut bad),
            Err(FrameError::MissingEndMarker { found: b'x' })
        );
        assert_eq!(codec.decode(&mut bad).unwrap().as_deref(), Some(PONG));
    }
}
