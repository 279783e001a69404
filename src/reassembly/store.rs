//! Per-file chunk accumulator.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

use super::ReassemblyError;
use crate::frame::DataType;

/// Result of feeding a chunk into a [`ChunkStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The chunk was new and has been stored.
    Stored,
    /// A chunk with the same sequence number was already stored; the new
    /// payload was discarded.
    Duplicate,
}

/// Chunks received so far for one filename on one connection.
///
/// The data type is fixed by the first chunk. Sequence numbers are written
/// at most once; completeness is judged against the highest sequence number
/// currently stored, not the one that carried the final-chunk flag.
#[derive(Debug)]
pub struct ChunkStore {
    data_type: DataType,
    chunks: BTreeMap<u32, Bytes>,
    last_seen: bool,
    final_sequence: Option<u32>,
    buffered_bytes: usize,
}

impl ChunkStore {
    /// Create an empty store for a file of `data_type`.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            chunks: BTreeMap::new(),
            last_seen: false,
            final_sequence: None,
            buffered_bytes: 0,
        }
    }

    /// Store `payload` at `sequence` unless that slot is already filled.
    pub fn add_chunk(&mut self, sequence: u32, payload: Bytes, is_last: bool) -> ChunkStatus {
        if self.chunks.contains_key(&sequence) {
            return ChunkStatus::Duplicate;
        }
        self.buffered_bytes = self.buffered_bytes.saturating_add(payload.len());
        self.chunks.insert(sequence, payload);
        if is_last {
            self.last_seen = true;
            self.final_sequence = Some(sequence);
        }
        ChunkStatus::Stored
    }

    /// Whether a final chunk has arrived and `0..=highest` are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last_seen
            && self
                .highest_sequence()
                .is_some_and(|highest| {
                    u64::try_from(self.chunks.len()).is_ok_and(|len| len == u64::from(highest) + 1)
                })
    }

    /// Concatenate the stored chunks in ascending sequence order.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::Incomplete`] if [`is_complete`](Self::is_complete)
    /// is false.
    pub fn reconstruct(&self) -> Result<Bytes, ReassemblyError> {
        if !self.is_complete() {
            return Err(ReassemblyError::Incomplete {
                received: self.chunks.len(),
                highest: self.highest_sequence(),
                last_seen: self.last_seen,
            });
        }
        if self.chunks.len() == 1
            && let Some(only) = self.chunks.values().next()
        {
            return Ok(only.clone());
        }
        let mut payload = BytesMut::with_capacity(self.buffered_bytes);
        for chunk in self.chunks.values() {
            payload.extend_from_slice(chunk);
        }
        Ok(payload.freeze())
    }

    /// Data type declared by the first chunk.
    #[must_use]
    pub const fn data_type(&self) -> DataType { self.data_type }

    /// Whether a chunk flagged as final has been stored.
    #[must_use]
    pub const fn last_seen(&self) -> bool { self.last_seen }

    /// Sequence number of the chunk that carried the final flag.
    #[must_use]
    pub const fn final_sequence(&self) -> Option<u32> { self.final_sequence }

    /// Largest sequence number stored so far.
    #[must_use]
    pub fn highest_sequence(&self) -> Option<u32> { self.chunks.last_key_value().map(|(k, _)| *k) }

    /// Number of distinct chunks stored.
    #[must_use]
    pub fn len(&self) -> usize { self.chunks.len() }

    /// Whether no chunks are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    /// Total payload bytes held by the store.
    #[must_use]
    pub const fn buffered_bytes(&self) -> usize { self.buffered_bytes }
}
