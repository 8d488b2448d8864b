//! Little-endian primitive readers and writers.

use crate::core::{DecodeError, MAX_ID_LEN};

/// Appends primitives to a byte buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create a writer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a LE16.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a LE64.
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a length-prefixed string.
    ///
    /// Callers validate lengths up front; identifiers are capped at
    /// [`MAX_ID_LEN`] by construction.
    pub fn put_str(&mut self, value: &str) -> Result<(), DecodeError> {
        let len = value.len();
        if len > MAX_ID_LEN {
            return Err(DecodeError::IdentifierTooLong(len));
        }
        self.buf.push(len as u8);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads primitives from a byte slice, tracking position.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read a LE16.
    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a LE64.
    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read a fixed-size byte array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.take_array()
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn str(&mut self) -> Result<&'a str, DecodeError> {
        let len = self.u8()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Require that the whole input was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        let mut w = WireWriter::with_capacity(16);
        w.put_u8(7);
        w.put_u16(0x0102);
        w.put_u64(42);
        w.put_str("abc").unwrap();
        let buf = w.into_inner();
        assert_eq!(&buf[1..3], &[0x02, 0x01]);

        let mut r = WireReader::new(&buf);
        assert_eq!(r.u8().unwrap(), 7);
        assert_eq!(r.u16().unwrap(), 0x0102);
        assert_eq!(r.u64().unwrap(), 42);
        assert_eq!(r.str().unwrap(), "abc");
        r.finish().unwrap();
    }

    #[test]
    fn test_truncated_string() {
        let data = [5u8, b'a', b'b'];
        let mut r = WireReader::new(&data);
        assert_eq!(r.str(), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [2u8, 0xff, 0xfe];
        let mut r = WireReader::new(&data);
        assert_eq!(r.str(), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_trailing_bytes() {
        let data = [1u8, 2, 3];
        let mut r = WireReader::new(&data);
        r.u8().unwrap();
        assert_eq!(r.finish(), Err(DecodeError::TrailingBytes(2)));
    }

    #[test]
    fn test_string_too_long() {
        let mut w = WireWriter::default();
        assert!(w.put_str(&"x".repeat(256)).is_err());
        assert!(w.is_empty());
    }
}
