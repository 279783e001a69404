//! Wire-level frame model.
//!
//! A [`Frame`] is one self-describing unit of the stream: a filename naming
//! the logical file, the declared [`DataType`], the chunk's zero-based
//! sequence number, the sender's final-chunk flag and the chunk payload.
//! Frames are immutable once built; the payload is held as [`Bytes`] so it can
//! be shared with the chunk store without copying.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Longest filename the one-byte length field can describe.
pub const MAX_FILENAME_LENGTH: usize = u8::MAX as usize;

/// Header bytes that do not depend on the filename: the filename length,
/// data type, payload length, sequence number and final-chunk flag.
pub const FIXED_HEADER_LENGTH: usize = 1 + 1 + 4 + 4 + 1;

/// Payload kind declared by the sender.
///
/// Unrecognised wire values are preserved in [`DataType::Unknown`] so callers
/// can decide what to do with them instead of losing the raw byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// JPEG-encoded colour image (`0x01`).
    Jpeg,
    /// Raw binary samples, e.g. a depth map (`0x02`).
    Bin,
    /// Comma-separated text, e.g. camera intrinsics (`0x03`).
    Csv,
    /// Any other wire value.
    Unknown(u8),
}

impl DataType {
    /// Wire value of this type.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Jpeg => 0x01,
            Self::Bin => 0x02,
            Self::Csv => 0x03,
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the type is one of the recognised variants.
    #[must_use]
    pub const fn is_known(self) -> bool { !matches!(self, Self::Unknown(_)) }

    /// Conventional file extension for stored payloads of this type.
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Jpeg => Some("jpg"),
            Self::Bin => Some("bin"),
            Self::Csv => Some("csv"),
            Self::Unknown(_) => None,
        }
    }
}

impl From<u8> for DataType {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => Self::Jpeg,
            0x02 => Self::Bin,
            0x03 => Self::Csv,
            other => Self::Unknown(other),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self { value.as_byte() }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("jpeg"),
            Self::Bin => f.write_str("bin"),
            Self::Csv => f.write_str("csv"),
            Self::Unknown(raw) => write!(f, "unknown({raw:#04x})"),
        }
    }
}

/// Errors raised when constructing a [`Frame`] locally.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The filename does not fit the one-byte length field.
    #[error("filename is {len} bytes; at most {MAX_FILENAME_LENGTH} are allowed")]
    FilenameTooLong {
        /// Encoded filename length.
        len: usize,
    },
    /// The payload does not fit the four-byte length field.
    #[error("payload is {len} bytes; at most {} are allowed", u32::MAX)]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
    },
}

/// One parsed or to-be-encoded chunk of a logical file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    filename: String,
    data_type: DataType,
    sequence: u32,
    is_last: bool,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, validating that it can be represented on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the filename exceeds 255 bytes or the payload
    /// exceeds `u32::MAX` bytes.
    pub fn new(
        filename: impl Into<String>,
        data_type: DataType,
        sequence: u32,
        is_last: bool,
        payload: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        let filename = filename.into();
        let payload = payload.into();
        if filename.len() > MAX_FILENAME_LENGTH {
            return Err(FrameError::FilenameTooLong {
                len: filename.len(),
            });
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
            });
        }
        Ok(Self::from_parts(
            filename, data_type, sequence, is_last, payload,
        ))
    }

    /// Assemble a frame from fields already validated by the parser.
    pub(crate) fn from_parts(
        filename: String,
        data_type: DataType,
        sequence: u32,
        is_last: bool,
        payload: Bytes,
    ) -> Self {
        Self {
            filename,
            data_type,
            sequence,
            is_last,
            payload,
        }
    }

    /// Logical file this chunk belongs to.
    #[must_use]
    pub fn filename(&self) -> &str { &self.filename }

    /// Declared payload kind.
    #[must_use]
    pub const fn data_type(&self) -> DataType { self.data_type }

    /// Zero-based chunk index within the file.
    #[must_use]
    pub const fn sequence(&self) -> u32 { self.sequence }

    /// Whether the sender marked this chunk as the final one.
    #[must_use]
    pub const fn is_last(&self) -> bool { self.is_last }

    /// Borrow the chunk payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Length of the header preceding the payload on the wire.
    #[must_use]
    pub fn header_len(&self) -> usize { FIXED_HEADER_LENGTH + self.filename.len() }

    /// Total encoded size of the frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize { self.header_len() + self.payload.len() }
}
