//! Frame parser and codec for the chunked file stream.
//!
//! Each frame on the wire is laid out as follows (multi-byte fields are
//! big-endian):
//!
//! | Field | Size |
//! |---|---|
//! | filename length `N` | 1 byte |
//! | filename (UTF-8) | `N` bytes |
//! | data type | 1 byte |
//! | payload length | 4 bytes |
//! | sequence number | 4 bytes |
//! | final-chunk flag | 1 byte |
//! | payload | payload length bytes |
//!
//! [`FrameParser`] extracts frames from a [`ByteBuffer`]. It never consumes a
//! byte it cannot fully interpret: when a header or payload is still partial
//! it returns `Ok(None)` and the buffer keeps resuming from a frame boundary.
//! [`FrameCodec`] exposes the same parser as a `tokio_util` codec for callers
//! that prefer `Framed` streams.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    buffer::ByteBuffer,
    byte_order::{read_network_u32_at, write_network_u32},
    frame::{DataType, FIXED_HEADER_LENGTH, Frame, FrameError},
};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Largest payload the four-byte length field can announce.
pub const MAX_PAYLOAD_LENGTH: usize = u32::MAX as usize;

/// Header fields decoded ahead of the payload.
#[derive(Debug)]
struct Header {
    filename: String,
    data_type: DataType,
    payload_len: usize,
    sequence: u32,
    is_last: bool,
    header_len: usize,
}

impl Header {
    fn frame_len(&self) -> Option<usize> { self.header_len.checked_add(self.payload_len) }
}

/// Stateless frame extractor.
///
/// The only state a parse depends on is the buffer handed to it, so a single
/// parser may be shared freely and reused across reads.
#[derive(Clone, Copy, Debug)]
pub struct FrameParser {
    max_payload_length: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self {
            max_payload_length: MAX_PAYLOAD_LENGTH,
        }
    }
}

impl FrameParser {
    /// Create a parser rejecting payloads longer than `max_payload_length`.
    ///
    /// Values above [`MAX_PAYLOAD_LENGTH`] are clamped to it.
    #[must_use]
    pub fn new(max_payload_length: usize) -> Self {
        Self {
            max_payload_length: max_payload_length.min(MAX_PAYLOAD_LENGTH),
        }
    }

    /// Maximum payload size accepted by this parser.
    #[must_use]
    pub const fn max_payload_length(&self) -> usize { self.max_payload_length }

    /// Extract the next complete frame from `buffer`.
    ///
    /// Returns `Ok(None)` while the buffer holds only part of a frame. Call
    /// repeatedly until it does to drain every complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Framing`] when the filename is not UTF-8 or the
    /// payload exceeds the configured maximum. The buffer is left untouched
    /// and the stream should be abandoned.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunkstream::{ByteBuffer, FrameParser};
    ///
    /// let mut buffer = ByteBuffer::new();
    /// buffer.append(&[1, b'f', 0x03, 0, 0, 0, 2, 0, 0, 0, 0]);
    /// let parser = FrameParser::default();
    /// assert!(parser.next_frame(&mut buffer).unwrap().is_none());
    ///
    /// buffer.append(&[1, b'a', b'b']);
    /// let frame = parser.next_frame(&mut buffer).unwrap().unwrap();
    /// assert_eq!(frame.filename(), "f");
    /// assert!(frame.is_last());
    /// assert_eq!(frame.payload().as_ref(), b"ab");
    /// assert!(buffer.is_empty());
    /// ```
    pub fn next_frame(&self, buffer: &mut ByteBuffer) -> Result<Option<Frame>, CodecError> {
        Ok(self.decode_from(buffer.as_bytes_mut())?)
    }

    /// Describe the partial frame left in `src` when the stream ends.
    ///
    /// Returns `None` if `src` is empty, i.e. the stream ended on a frame
    /// boundary.
    #[must_use]
    pub fn pending_eof(&self, src: &[u8]) -> Option<EofError> {
        let &name_len = src.first()?;
        let header_len = FIXED_HEADER_LENGTH + usize::from(name_len);
        let payload_len = read_network_u32_at(src, header_len - 9);
        match payload_len {
            Some(expected) if src.len() >= header_len => Some(EofError::MidFrame {
                bytes_received: src.len() - header_len,
                expected: expected as usize,
            }),
            _ => Some(EofError::MidHeader {
                bytes_received: src.len(),
                header_size: header_len,
            }),
        }
    }

    fn decode_from(&self, src: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        let Some(header) = self.peek_header(src)? else {
            return Ok(None);
        };
        let Some(frame_len) = header.frame_len() else {
            return Err(FramingError::OversizedPayload {
                size: header.payload_len,
                max: self.max_payload_length,
            });
        };
        if src.len() < frame_len {
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len).freeze();
        let payload = frame.split_off(header.header_len);
        Ok(Some(Frame::from_parts(
            header.filename,
            header.data_type,
            header.sequence,
            header.is_last,
            payload,
        )))
    }

    fn peek_header(&self, src: &[u8]) -> Result<Option<Header>, FramingError> {
        let Some(&name_len) = src.first() else {
            return Ok(None);
        };
        let name_len = usize::from(name_len);
        let header_len = FIXED_HEADER_LENGTH + name_len;
        let Some(header) = src.get(..header_len) else {
            return Ok(None);
        };

        let name_end = 1 + name_len;
        let name_bytes = header.get(1..name_end).unwrap_or_default();
        let filename = std::str::from_utf8(name_bytes)
            .map_err(|err| FramingError::InvalidFilename {
                len: name_len,
                valid_up_to: err.valid_up_to(),
            })?
            .to_owned();

        let data_type = DataType::from(header.get(name_end).copied().unwrap_or_default());
        let declared = read_network_u32_at(header, name_end + 1).unwrap_or_default();
        let sequence = read_network_u32_at(header, name_end + 5).unwrap_or_default();
        let is_last = header.get(name_end + 9).is_some_and(|&flag| flag != 0);

        let payload_len = declared as usize;
        if payload_len > self.max_payload_length {
            return Err(FramingError::OversizedPayload {
                size: payload_len,
                max: self.max_payload_length,
            });
        }

        Ok(Some(Header {
            filename,
            data_type,
            payload_len,
            sequence,
            is_last,
            header_len,
        }))
    }
}

/// Append the wire encoding of `frame` to `dst`.
///
/// # Errors
///
/// Returns [`FrameError`] if the filename or payload cannot be described by
/// the header's length fields.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use chunkstream::{DataType, Frame, codec::encode_frame};
///
/// let frame = Frame::new("f", DataType::Csv, 1, false, &b"xy"[..]).unwrap();
/// let mut wire = BytesMut::new();
/// encode_frame(&frame, &mut wire).unwrap();
/// assert_eq!(&wire[..], &[1, b'f', 3, 0, 0, 0, 2, 0, 0, 0, 1, 0, b'x', b'y']);
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
    let name = frame.filename().as_bytes();
    let name_len = u8::try_from(name.len())
        .map_err(|_| FrameError::FilenameTooLong { len: name.len() })?;
    let payload_len =
        u32::try_from(frame.payload().len()).map_err(|_| FrameError::PayloadTooLarge {
            len: frame.payload().len(),
        })?;

    dst.reserve(frame.encoded_len());
    dst.put_u8(name_len);
    dst.put_slice(name);
    dst.put_u8(frame.data_type().as_byte());
    dst.put_slice(&write_network_u32(payload_len));
    dst.put_slice(&write_network_u32(frame.sequence()));
    dst.put_u8(u8::from(frame.is_last()));
    dst.put_slice(frame.payload());
    Ok(())
}

/// `tokio_util` codec over [`FrameParser`] and [`encode_frame`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec {
    parser: FrameParser,
}

impl FrameCodec {
    /// Construct a codec rejecting inbound payloads above `max_payload_length`.
    #[must_use]
    pub fn new(max_payload_length: usize) -> Self {
        Self {
            parser: FrameParser::new(max_payload_length),
        }
    }

    /// Parser used for decoding.
    #[must_use]
    pub const fn parser(&self) -> &FrameParser { &self.parser }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.parser.decode_from(src)?)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.parser.pending_eof(src) {
            Some(err) => Err(err.into()),
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Ok(encode_frame(&item, dst)?)
    }
}
