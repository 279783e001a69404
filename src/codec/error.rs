//! Error types for the frame parser and codec.
//!
//! # Error Categories
//!
//! - [`FramingError`]: the byte stream can no longer be trusted to realign on a frame boundary
//!   (undecodable filename, payload beyond the configured limit).
//! - [`EofError`]: the peer closed the stream with a partial frame still buffered.
//! - [`CodecError`]: top-level enum wrapping the categories above plus I/O and local encoding
//!   failures.
//!
//! Insufficient buffered bytes are never an error: the parser returns
//! `Ok(None)` and the caller reads more from the transport.

use std::io;

use thiserror::Error;

use crate::frame::FrameError;

/// Errors that corrupt the framing state of a connection.
///
/// The parser never guesses a resynchronisation point, so every variant is
/// fatal for the session that produced it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The filename bytes are not valid UTF-8.
    #[error("filename of {len} bytes is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidFilename {
        /// Declared filename length.
        len: usize,
        /// Index of the first invalid byte within the filename.
        valid_up_to: usize,
    },

    /// The payload length field exceeds the configured maximum.
    #[error("payload exceeds max length: {size} > {max}")]
    OversizedPayload {
        /// Payload size announced by the header.
        size: usize,
        /// Maximum payload size accepted by the parser.
        max: usize,
    },
}

/// EOF conditions that leave a partial frame behind.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The connection closed while the header was being read.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Header size, when the filename length byte had arrived; otherwise the fixed part.
        header_size: usize,
    },

    /// The connection closed after the header but before the full payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte payload received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Declared payload size.
        expected: usize,
    },
}

/// Top-level codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing state is corrupt.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// A frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] FrameError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End of stream with a partial frame buffered.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging and metrics.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunkstream::codec::{CodecError, FramingError};
    ///
    /// let err = CodecError::from(FramingError::OversizedPayload { size: 9, max: 8 });
    /// assert_eq!(err.error_type(), "framing");
    /// ```
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Encode(_) => "encode",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl CodecError {
    /// Whether the connection that produced this error must be closed.
    ///
    /// Everything except a local encoding failure leaves the inbound byte
    /// stream unusable.
    #[must_use]
    pub fn should_disconnect(&self) -> bool { !matches!(self, Self::Encode(_)) }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Encode(e) => io::Error::new(io::ErrorKind::InvalidInput, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}
