//! Bolt chunk framing for tokio_util codecs.
//!
//! Messages are split into chunks with a 2-byte big-endian length prefix and
//! terminated by a zero-length chunk. The codecs here are plain
//! `Decoder`/`Encoder` implementations over `BytesMut`, so they drive blocking
//! streams just as well as async ones.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::error::{BoltError, FramingError};
use super::message::{BoltRequest, BoltResponse};
use super::packstream::{decode_message, message_signature, PackStreamEncoder, Value};

/// Default maximum chunk size (16KB)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16384;

/// Largest chunk the 2-byte header can describe
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Default maximum message size (16MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Chunk framer: raw message bytes in, chunked frames out (and back).
#[derive(Debug)]
pub struct ChunkCodec {
    max_chunk_size: usize,
    max_message_size: usize,
    /// Payload accumulated for the message in progress
    message_buffer: BytesMut,
}

impl ChunkCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec with custom limits. The chunk size is clamped to 1..=65535.
    pub fn with_limits(max_chunk_size: usize, max_message_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.clamp(1, MAX_CHUNK_SIZE),
            max_message_size,
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Whether a message has been partially received.
    pub fn in_message(&self) -> bool {
        !self.message_buffer.is_empty()
    }

    /// Encode a message into chunks.
    fn encode_chunked(&self, data: &[u8], dst: &mut BytesMut) {
        dst.reserve(data.len() + 2 * (data.len() / self.max_chunk_size + 2));

        for chunk in data.chunks(self.max_chunk_size) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
            trace!(size = chunk.len(), "Chunk written");
        }

        dst.put_slice(&END_MARKER);
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Need at least 2 bytes for chunk header
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);

                if self.message_buffer.is_empty() {
                    return Err(FramingError::EmptyMessage.into());
                }

                let message = self.message_buffer.split().freeze();
                trace!(size = message.len(), "Message reassembled");
                return Ok(Some(message));
            }

            let size = self.message_buffer.len() + chunk_size;
            if size > self.max_message_size {
                return Err(FramingError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                }
                .into());
            }

            // Need chunk header + chunk data
            if src.len() < 2 + chunk_size {
                src.reserve(2 + chunk_size - src.len());
                return Ok(None);
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
            trace!(size = chunk_size, "Chunk read");
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() && !self.in_message() => Ok(None),
            None => Err(FramingError::ConnectionClosed.into()),
        }
    }
}

impl Encoder<&[u8]> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() {
            return Err(FramingError::EmptyMessage.into());
        }
        if item.len() > self.max_message_size {
            return Err(FramingError::MessageTooLarge {
                size: item.len(),
                max: self.max_message_size,
            }
            .into());
        }
        self.encode_chunked(item, dst);
        Ok(())
    }
}

/// Client-side message codec: encodes requests, decodes responses.
#[derive(Debug, Default)]
pub struct MessageCodec {
    inner: ChunkCodec,
    encoder: PackStreamEncoder,
    /// Signature of the last reassembled message, decodable or not
    last_signature: Option<u8>,
}

impl MessageCodec {
    /// Create a new message codec with default limits.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_limits(max_chunk_size: usize, max_message_size: usize) -> Self {
        Self {
            inner: ChunkCodec::with_limits(max_chunk_size, max_message_size),
            encoder: PackStreamEncoder::new(),
            last_signature: None,
        }
    }

    pub fn chunks(&self) -> &ChunkCodec {
        &self.inner
    }

    /// Signature of the message the last `decode` call reassembled.
    ///
    /// `None` when that call produced no message, or the message was not a
    /// structure. Lets a caller tell which kind of message failed to decode.
    pub fn last_signature(&self) -> Option<u8> {
        self.last_signature
    }

    fn parse(&mut self, message: Option<Bytes>) -> Result<Option<BoltResponse>, BoltError> {
        let Some(message) = message else {
            return Ok(None);
        };
        self.last_signature = message_signature(&message);
        let structure = decode_message(&message)?;
        Ok(Some(BoltResponse::from_structure(&structure)?))
    }
}

impl Decoder for MessageCodec {
    type Item = BoltResponse;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.last_signature = None;
        let message = self.inner.decode(src)?;
        self.parse(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.last_signature = None;
        let message = self.inner.decode_eof(src)?;
        self.parse(message)
    }
}

impl Encoder<&BoltRequest> for MessageCodec {
    type Error = BoltError;

    fn encode(&mut self, item: &BoltRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoder.clear();
        self.encoder.encode(&Value::Structure(item.to_structure()))?;
        let Self { inner, encoder, .. } = self;
        inner.encode(encoder.as_bytes(), dst)
    }
}
