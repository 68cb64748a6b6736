//! Byte buffer backing every frame
//!
//! A [`ByteBuffer`] is one contiguous byte region. It is either *growable*
//! (created by the codecs themselves in build mode, writes past the end extend
//! it) or *fixed* (supplied from outside, its length never changes).
//!
//! Frames borrow or own a buffer; resizing needs `&mut` access, so a buffer
//! cannot be resized while any view derived from it is alive.

use bytes::{Bytes, BytesMut};
use ofswitch_core::{Error, Result};
use std::fmt;

/// Growth policy of a [`ByteBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Owned, zero-fills on growth
    Growable,
    /// Externally supplied, length fixed for the buffer's lifetime
    Fixed,
}

/// Contiguous byte storage with bounds-checked access
#[derive(Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: BytesMut,
    mode: BufferMode,
}

impl ByteBuffer {
    /// Create an empty growable buffer
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            mode: BufferMode::Growable,
        }
    }

    /// Create an empty growable buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            mode: BufferMode::Growable,
        }
    }

    /// Create a growable buffer of `len` zero bytes
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: BytesMut::zeroed(len),
            mode: BufferMode::Growable,
        }
    }

    /// Wrap externally supplied bytes; the length stays fixed
    pub fn fixed(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
            mode: BufferMode::Fixed,
        }
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    pub fn is_growable(&self) -> bool {
        self.mode == BufferMode::Growable
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read `len` bytes starting at `offset`
    pub fn read(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = checked_end(offset, len, self.data.len())?;
        Ok(&self.data[offset..end])
    }

    /// Write `bytes` at `offset`
    ///
    /// Growable buffers are extended (zero-filled) when the write runs past
    /// the end; fixed buffers fail with `OutOfBounds`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or_else(|| Error::out_of_bounds(offset, bytes.len(), self.data.len()))?;
        if end > self.data.len() {
            self.resize(end)?;
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Change the buffer length, zero-filling new bytes
    ///
    /// Only growable buffers can change length.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        let len = self.data.len();
        if new_len == len {
            return Ok(());
        }
        match self.mode {
            BufferMode::Growable => {
                self.data.resize(new_len, 0);
                Ok(())
            }
            BufferMode::Fixed if new_len > len => Err(Error::out_of_bounds(0, new_len, len)),
            BufferMode::Fixed => Err(Error::invalid_parameter(
                "new_len",
                "fixed buffers cannot be truncated",
            )),
        }
    }

    /// Find the first occurrence of `pattern` at or after `start`
    ///
    /// Linear forward scan. An empty pattern matches at `start` when `start`
    /// is within the buffer.
    pub fn find_first_of(&self, pattern: &[u8], start: usize) -> Option<usize> {
        let data = self.data.get(start..)?;
        if pattern.is_empty() {
            return Some(start);
        }
        data.windows(pattern.len())
            .position(|window| window == pattern)
            .map(|pos| start + pos)
    }

    /// Find the first byte equal to `value` at or after `start`
    pub fn find_byte(&self, value: u8, start: usize) -> Option<usize> {
        self.data
            .get(start..)?
            .iter()
            .position(|&b| b == value)
            .map(|pos| start + pos)
    }

    /// Freeze into an immutable, cheaply clonable [`Bytes`]
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

fn checked_end(offset: usize, len: usize, available: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(end),
        _ => Err(Error::out_of_bounds(offset, len, available)),
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for ByteBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: BytesMut::from(&data[..]),
            mode: BufferMode::Growable,
        }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
            mode: BufferMode::Growable,
        }
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.data.len())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Hex dump, 16 bytes per line
impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, chunk) in self.data.chunks(16).enumerate() {
            write!(f, "{:04x}:", line * 16)?;
            for byte in chunk {
                write!(f, " {:02x}", byte)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let buf = ByteBuffer::from(vec![1, 2, 3, 4, 5]);
        assert_eq!(buf.read(1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(buf.read(5, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let buf = ByteBuffer::from(vec![1, 2, 3]);
        assert_eq!(buf.read(2, 2), Err(Error::out_of_bounds(2, 2, 3)));
        assert!(buf.read(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_write_grows_growable_buffer() {
        let mut buf = ByteBuffer::zeroed(2);
        buf.write(4, &[0xaa, 0xbb]).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 0, 0xaa, 0xbb]);
    }

    #[test]
    fn test_write_fixed_buffer_fails() {
        let mut buf = ByteBuffer::fixed(&[0; 4]);
        assert!(buf.write(0, &[1, 2, 3, 4]).is_ok());
        assert_eq!(buf.write(2, &[1, 2, 3]), Err(Error::out_of_bounds(0, 5, 4)));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_fixed_buffer_length_is_fixed() {
        let mut buf = ByteBuffer::fixed(&[0; 4]);
        assert!(buf.resize(8).is_err());
        assert!(buf.resize(2).is_err());
        assert!(buf.resize(4).is_ok());
    }

    #[test]
    fn test_find_first_of() {
        let buf = ByteBuffer::from(vec![0x01, 0x02, 0x03, 0x01, 0x02, 0x04]);
        assert_eq!(buf.find_first_of(&[0x01, 0x02], 0), Some(0));
        assert_eq!(buf.find_first_of(&[0x01, 0x02], 1), Some(3));
        assert_eq!(buf.find_first_of(&[0x02, 0x04], 0), Some(4));
        assert_eq!(buf.find_first_of(&[0x05], 0), None);
        assert_eq!(buf.find_first_of(&[0x01], 10), None);
    }

    #[test]
    fn test_find_byte() {
        let buf = ByteBuffer::from(vec![0x00, 0xff, 0x00, 0xff]);
        assert_eq!(buf.find_byte(0xff, 0), Some(1));
        assert_eq!(buf.find_byte(0xff, 2), Some(3));
        assert_eq!(buf.find_byte(0x42, 0), None);
    }

    #[test]
    fn test_hex_dump() {
        let buf = ByteBuffer::from(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(buf.to_string(), "0000: de ad be ef\n");
    }
}
