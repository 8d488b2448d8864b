//! Length-prefixed framing for the stream-oriented control channel.
//!
//! A stream transport does not preserve send boundaries, so every control
//! message travels as one frame:
//!
//! ```text
//! +0  Body Length (4 bytes LE32)
//! +4  Body (Body Length bytes)
//! ```

use crate::core::{EncodeError, MAX_CONTROL_FRAME_SIZE};

/// Size of the frame length header.
pub const FRAME_LENGTH_SIZE: usize = 4;

/// Wrap `body` in a frame.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if body.len() > MAX_CONTROL_FRAME_SIZE {
        return Err(EncodeError::TooLarge {
            size: body.len(),
            limit: MAX_CONTROL_FRAME_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(FRAME_LENGTH_SIZE + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Parse a frame header, returning the body length.
///
/// Zero-length and oversized frames are rejected before any body is read.
pub fn decode_frame_length(header: [u8; FRAME_LENGTH_SIZE]) -> Result<usize, EncodeError> {
    let len = u32::from_le_bytes(header) as usize;
    if len == 0 || len > MAX_CONTROL_FRAME_SIZE {
        return Err(EncodeError::TooLarge {
            size: len,
            limit: MAX_CONTROL_FRAME_SIZE,
        });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(frame, vec![3, 0, 0, 0, 0xAA, 0xBB, 0xCC]);
        assert_eq!(decode_frame_length([3, 0, 0, 0]).unwrap(), 3);
    }

    #[test]
    fn test_oversized_body_rejected() {
        let body = vec![0u8; MAX_CONTROL_FRAME_SIZE + 1];
        assert!(matches!(
            encode_frame(&body),
            Err(EncodeError::TooLarge { .. })
        ));
        let header = ((MAX_CONTROL_FRAME_SIZE + 1) as u32).to_le_bytes();
        assert!(decode_frame_length(header).is_err());
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(decode_frame_length([0, 0, 0, 0]).is_err());
    }
}
