//! Byte-level stream reader and writer for the wire format.
//!
//! The protobuf wire format is octet-oriented, so unlike a bit-packed codec
//! the cursor only ever moves in whole bytes. Reads never panic: running past
//! the end of the input is reported as `MalformedInput`.

use crate::{Error, Result};

/// Writes bytes into a growable buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Creates a new empty `ByteWriter`.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Writes a single byte.
    #[inline(always)]
    pub fn write_byte(&mut self, val: u8) {
        self.buf.push(val);
    }

    /// Schreibt ein Byte-Slice (O(1) amortized).
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a little-endian `u32` (fixed32 payload).
    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Writes a little-endian `u64` (fixed64 payload).
    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Returns the number of bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Returns a reference to the written bytes so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Finalises the writer and returns the buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads bytes from a borrowed slice.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    /// Naechstes ungelesenes Byte in data.
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a new `ByteReader` over the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Creates a reader positioned at `offset`.
    ///
    /// An offset past the end is clamped; the first read then fails.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset.min(data.len()) }
    }

    /// Reads one byte.
    #[inline(always)]
    pub fn read_byte(&mut self) -> Result<u8> {
        let Some(&b) = self.data.get(self.pos) else {
            return Err(Error::truncated());
        };
        self.pos += 1;
        Ok(b)
    }

    /// Borrows the next `n` bytes and advances past them.
    ///
    /// Der Zustand bleibt bei Fehler unveraendert.
    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(Error::truncated)?;
        if end > self.data.len() {
            return Err(Error::malformed(format!(
                "declared length {n} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.read_slice(4).map_err(|_| Error::truncated())?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(arr))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64_le(&mut self) -> Result<u64> {
        let bytes = self.read_slice(8).map_err(|_| Error::truncated())?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }

    /// Returns the current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_default_is_empty() {
        let w = ByteWriter::default();
        assert_eq!(w.position(), 0);
        assert!(w.into_vec().is_empty());
    }

    #[test]
    fn write_read_bytes() {
        let mut w = ByteWriter::new();
        w.write_byte(0x08);
        w.write_bytes(&[0x96, 0x01]);
        assert_eq!(w.bytes(), &[0x08, 0x96, 0x01]);

        let data = w.into_vec();
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_byte().unwrap(), 0x08);
        assert_eq!(r.read_slice(2).unwrap(), &[0x96, 0x01]);
        assert!(r.is_empty());
    }

    #[test]
    fn fixed_width_little_endian() {
        let mut w = ByteWriter::new();
        w.write_u32_le(0x0102_0304);
        w.write_u64_le(0x1122_3344_5566_7788);
        let data = w.into_vec();
        assert_eq!(&data[..4], &[0x04, 0x03, 0x02, 0x01]);

        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u32_le().unwrap(), 0x0102_0304);
        assert_eq!(r.read_u64_le().unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn read_byte_eof() {
        let mut r = ByteReader::new(&[]);
        assert!(r.read_byte().unwrap_err().is_malformed());
    }

    #[test]
    fn read_slice_past_end_keeps_position() {
        let data = [1u8, 2, 3];
        let mut r = ByteReader::new(&data);
        r.read_byte().unwrap();
        let err = r.read_slice(5).unwrap_err();
        assert!(err.to_string().contains("exceeds remaining 2"), "{err}");
        assert_eq!(r.position(), 1);
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn read_fixed_truncated() {
        let mut r = ByteReader::new(&[0, 0, 0]);
        assert_eq!(r.read_u32_le().unwrap_err(), Error::truncated());
        let mut r = ByteReader::new(&[0; 7]);
        assert_eq!(r.read_u64_le().unwrap_err(), Error::truncated());
    }

    #[test]
    fn reader_at_offset() {
        let data = [9u8, 8, 7, 6];
        let mut r = ByteReader::at(&data, 1);
        assert_eq!(r.read_byte().unwrap(), 8);
        assert_eq!(r.position(), 2);
        assert_eq!(r.remaining(), 2);

        let mut past = ByteReader::at(&data, 99);
        assert!(past.is_empty());
        assert!(past.read_byte().is_err());
    }
}
