//! Data input traits and implementations for jute decoding.

use crate::error::{Result, ZooKeeperError};
use bytes::{Buf, Bytes};
use std::io::Cursor;

/// Trait for reading primitive values from the jute binary format.
///
/// All multi-byte values are read in big-endian byte order.
pub trait DataInput {
    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads an 8-byte long as an opaque big-endian blob.
    fn read_long(&mut self) -> Result<[u8; 8]>;

    /// Reads a boolean from a single byte; only `1` is true.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Bytes>;

    /// Reads a length prefix, where `-1` means absent.
    fn read_length(&mut self) -> Result<Option<usize>> {
        match self.read_int()? {
            -1 => Ok(None),
            len if len < 0 => Err(ZooKeeperError::Serialization(format!(
                "invalid length prefix: {}",
                len
            ))),
            len => Ok(Some(len as usize)),
        }
    }

    /// Reads a length-prefixed buffer.
    fn read_buffer(&mut self) -> Result<Option<Bytes>> {
        match self.read_length()? {
            Some(len) => self.read_bytes(len).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a length-prefixed UTF-8 string.
    fn read_ustring(&mut self) -> Result<Option<String>> {
        match self.read_buffer()? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| {
                    ZooKeeperError::Serialization(format!("invalid UTF-8 string: {}", e))
                }),
            None => Ok(None),
        }
    }
}

/// A slice-backed implementation of `DataInput`.
#[derive(Debug)]
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(ZooKeeperError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    fn read_long(&mut self) -> Result<[u8; 8]> {
        self.ensure_remaining(8)?;
        let mut blob = [0u8; 8];
        self.cursor.copy_to_slice(&mut blob);
        Ok(blob)
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() == 1)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.ensure_remaining(len)?;
        Ok(self.cursor.copy_to_bytes(len))
    }
}
