//! Data output traits and implementations for jute encoding.

use crate::error::{Result, ZooKeeperError};
use bytes::BufMut;

/// Trait for writing primitive values in the jute binary format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes an 8-byte long blob verbatim.
    fn write_long(&mut self, v: &[u8; 8]) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a length-prefixed buffer; `None` is encoded as length `-1`.
    fn write_buffer(&mut self, v: Option<&[u8]>) -> Result<()> {
        match v {
            Some(bytes) => {
                self.write_int(bytes.len() as i32)?;
                self.write_bytes(bytes)
            }
            None => self.write_int(-1),
        }
    }

    /// Writes a length-prefixed UTF-8 string; `None` is encoded as length `-1`.
    fn write_ustring(&mut self, v: Option<&str>) -> Result<()> {
        self.write_buffer(v.map(str::as_bytes))
    }
}

/// A `DataOutput` that writes into a caller-provided slice.
///
/// The slice must be large enough; running out of space is an error rather
/// than a reallocation.
#[derive(Debug)]
pub struct ObjectDataOutput<'a> {
    buffer: &'a mut [u8],
    written: usize,
}

impl<'a> ObjectDataOutput<'a> {
    /// Creates an output writing from the start of `buffer`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, written: 0 }
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.written
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Returns the number of bytes still available.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    fn ensure_capacity(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(ZooKeeperError::Serialization(format!(
                "buffer does not have enough space: need {} bytes, have {}",
                n,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    fn tail(&mut self) -> &mut [u8] {
        &mut self.buffer[self.written..]
    }
}

impl DataOutput for ObjectDataOutput<'_> {
    fn write_int(&mut self, v: i32) -> Result<()> {
        self.ensure_capacity(4)?;
        self.tail().put_i32(v);
        self.written += 4;
        Ok(())
    }

    fn write_long(&mut self, v: &[u8; 8]) -> Result<()> {
        self.write_bytes(v)
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.ensure_capacity(1)?;
        self.tail().put_u8(if v { 1 } else { 0 });
        self.written += 1;
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.ensure_capacity(v.len())?;
        self.tail().put_slice(v);
        self.written += v.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let mut buf = [0u8; 8];
        let output = ObjectDataOutput::new(&mut buf);
        assert!(output.is_empty());
        assert_eq!(output.remaining(), 8);
    }

    #[test]
    fn test_write_int_big_endian() {
        let mut buf = [0u8; 4];
        let mut output = ObjectDataOutput::new(&mut buf);
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.len(), 4);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_write_long_verbatim() {
        let blob = [9, 8, 7, 6, 5, 4, 3, 2];
        let mut buf = [0u8; 8];
        ObjectDataOutput::new(&mut buf).write_long(&blob).unwrap();
        assert_eq!(buf, blob);
    }

    #[test]
    fn test_write_bool() {
        let mut buf = [0xAAu8; 2];
        let mut output = ObjectDataOutput::new(&mut buf);
        output.write_bool(true).unwrap();
        output.write_bool(false).unwrap();
        assert_eq!(buf, [1, 0]);
    }

    #[test]
    fn test_write_buffer() {
        let mut buf = [0u8; 7];
        ObjectDataOutput::new(&mut buf)
            .write_buffer(Some(&[7, 8, 9]))
            .unwrap();
        assert_eq!(buf, [0, 0, 0, 3, 7, 8, 9]);
    }

    #[test]
    fn test_write_absent_buffer() {
        let mut buf = [0u8; 4];
        ObjectDataOutput::new(&mut buf).write_buffer(None).unwrap();
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_write_ustring() {
        let mut buf = [0u8; 6];
        ObjectDataOutput::new(&mut buf)
            .write_ustring(Some("/a"))
            .unwrap();
        assert_eq!(buf, [0, 0, 0, 2, b'/', b'a']);
    }

    #[test]
    fn test_write_past_end_fails() {
        let mut buf = [0u8; 3];
        let mut output = ObjectDataOutput::new(&mut buf);
        assert!(output.write_int(1).is_err());
        assert!(output.is_empty());
    }
}
