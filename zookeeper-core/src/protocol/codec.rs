//! Codec for framing jute requests and replies on a byte stream.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::SIZE_OF_LENGTH_FIELD;
use super::Request;
use crate::error::{Result, ZooKeeperError};

/// Largest reply frame accepted by default.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// Codec for jute request and reply frames.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use
/// with tokio's framed I/O. Encoding writes a length-prefixed request;
/// decoding yields each reply frame with its length prefix removed.
#[derive(Debug)]
pub struct JuteCodec {
    max_frame_length: usize,
}

impl JuteCodec {
    /// Creates a new codec instance.
    pub fn new() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Sets the largest reply frame this codec accepts.
    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Returns the largest reply frame this codec accepts.
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for JuteCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Request> for JuteCodec {
    type Error = ZooKeeperError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        item.encode_into(dst)?;
        tracing::trace!(length = dst.len() - start, "encoded request frame");
        Ok(())
    }
}

impl Decoder for JuteCodec {
    type Item = BytesMut;
    type Error = ZooKeeperError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < SIZE_OF_LENGTH_FIELD {
            return Ok(None);
        }

        let length = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if length < 0 {
            return Err(ZooKeeperError::Protocol(format!(
                "negative frame length: {}",
                length
            )));
        }
        let length = length as usize;
        if length > self.max_frame_length {
            return Err(ZooKeeperError::Protocol(format!(
                "frame length {} exceeds maximum {}",
                length, self.max_frame_length
            )));
        }

        let total_frame_size = SIZE_OF_LENGTH_FIELD + length;
        if src.len() < total_frame_size {
            src.reserve(total_frame_size - src.len());
            return Ok(None);
        }

        src.advance(SIZE_OF_LENGTH_FIELD);
        tracing::trace!(length, "decoded reply frame");
        Ok(Some(src.split_to(length)))
    }
}
