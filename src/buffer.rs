//! Per-connection accumulator for bytes read from the transport.
//!
//! [`ByteBuffer`] is append-only at the back and consumed from the front as
//! frames are extracted. Unconsumed bytes survive across any number of
//! appends, so a header or payload that straddles two transport reads is
//! parsed once the remainder arrives.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors raised by [`ByteBuffer`] operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A caller asked for more bytes than are buffered.
    #[error("cannot consume {requested} bytes: only {available} buffered")]
    Underflow {
        /// Bytes requested by the caller.
        requested: usize,
        /// Bytes currently held by the buffer.
        available: usize,
    },
}

/// Growable byte accumulator owned by a single connection.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    inner: BytesMut,
}

impl ByteBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes received from the transport.
    pub fn append(&mut self, bytes: &[u8]) { self.inner.extend_from_slice(bytes); }

    /// Remove and return the first `n` bytes.
    ///
    /// The returned [`Bytes`] shares the underlying allocation, so slicing a
    /// payload out of a consumed frame does not copy.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Underflow`] if fewer than `n` bytes are buffered.
    /// The buffer is left untouched in that case.
    pub fn consume(&mut self, n: usize) -> Result<Bytes, BufferError> {
        if n > self.inner.len() {
            return Err(BufferError::Underflow {
                requested: n,
                available: self.inner.len(),
            });
        }
        Ok(self.inner.split_to(n).freeze())
    }

    /// Borrow the unconsumed bytes without removing them.
    #[must_use]
    pub fn peek(&self) -> &[u8] { &self.inner }

    /// Number of unconsumed bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.inner.len() }

    /// Whether no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }

    /// Drop every buffered byte.
    pub fn clear(&mut self) { self.inner.clear(); }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut BytesMut { &mut self.inner }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            inner: BytesMut::from(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_returns_front_bytes_in_order() {
        let mut buffer = ByteBuffer::new();
        buffer.append(b"abc");
        buffer.append(b"def");

        assert_eq!(buffer.consume(2).expect("two bytes buffered"), &b"ab"[..]);
        assert_eq!(buffer.consume(4).expect("four bytes buffered"), &b"cdef"[..]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn consume_more_than_buffered_fails_without_mutation() {
        let mut buffer = ByteBuffer::from(&b"xy"[..]);

        let err = buffer.consume(3).expect_err("underflow must be reported");
        assert_eq!(
            err,
            BufferError::Underflow {
                requested: 3,
                available: 2,
            }
        );
        assert_eq!(buffer.peek(), b"xy");
    }

    #[test]
    fn consume_zero_is_a_no_op() {
        let mut buffer = ByteBuffer::from(&b"q"[..]);
        assert!(buffer.consume(0).expect("zero is always available").is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn clear_discards_everything() {
        let mut buffer = ByteBuffer::with_capacity(16);
        buffer.append(&[1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
