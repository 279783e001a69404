//! Per-connection reassembly of chunked files.
//!
//! [`Reassembler`] maps each filename seen on a connection to a
//! [`ChunkStore`]. Frames are fed in arrival order; once a store is complete
//! its payload is concatenated in sequence order, the store is removed, and
//! the caller receives a [`CompletedFile`] to dispatch. Nothing here is
//! shared between connections, so no locking is involved.

use std::collections::{HashMap, hash_map::Entry};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::{DataType, Frame};

mod store;

pub use store::{ChunkStatus, ChunkStore};

/// Errors raised by reassembly.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The store was asked for its payload before every chunk arrived.
    #[error(
        "file incomplete: {received} chunks stored, highest sequence {highest:?}, final chunk \
         seen: {last_seen}"
    )]
    Incomplete {
        /// Distinct chunks stored.
        received: usize,
        /// Largest sequence number stored.
        highest: Option<u32>,
        /// Whether the final-chunk flag has been seen.
        last_seen: bool,
    },
}

/// What to do with the first chunk of a filename whose data type is not
/// recognised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTypePolicy {
    /// Log and discard the chunk. No store is created and nothing is sent
    /// back to the peer.
    #[default]
    Drop,
    /// Discard the chunk and answer with a negative acknowledgment.
    Reject,
    /// Accept the chunk and reassemble the file as opaque bytes.
    Opaque,
}

/// A fully reassembled file ready for dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedFile {
    filename: String,
    data_type: DataType,
    payload: Bytes,
}

impl CompletedFile {
    /// Construct a completed file.
    #[must_use]
    pub fn new(filename: impl Into<String>, data_type: DataType, payload: Bytes) -> Self {
        Self {
            filename: filename.into(),
            data_type,
            payload,
        }
    }

    /// Filename shared by every chunk of this file.
    #[must_use]
    pub fn filename(&self) -> &str { &self.filename }

    /// Data type fixed by the file's first chunk.
    #[must_use]
    pub const fn data_type(&self) -> DataType { self.data_type }

    /// Borrow the reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the file, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

/// Outcome of feeding one frame to a [`Reassembler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assembly {
    /// The chunk was stored; the file still needs more chunks.
    Pending,
    /// The sequence number was already stored; the chunk was ignored.
    Duplicate,
    /// The first chunk declared an unknown type and was dropped silently.
    Dropped {
        /// Declared data type.
        data_type: DataType,
    },
    /// The first chunk declared an unknown type and should be refused.
    Rejected {
        /// Filename carried by the refused chunk.
        filename: String,
        /// Declared data type.
        data_type: DataType,
    },
    /// The chunk completed the file. Its store has been removed.
    Complete(CompletedFile),
}

/// Filename-keyed set of in-flight chunk stores for one connection.
#[derive(Debug, Default)]
pub struct Reassembler {
    stores: HashMap<String, ChunkStore>,
    unknown_policy: UnknownTypePolicy,
}

impl Reassembler {
    /// Create a reassembler applying `unknown_policy` to unrecognised types.
    #[must_use]
    pub fn new(unknown_policy: UnknownTypePolicy) -> Self {
        Self {
            stores: HashMap::new(),
            unknown_policy,
        }
    }

    /// Feed one parsed frame.
    ///
    /// A store is created the first time a filename is seen, bound to that
    /// frame's data type. Later frames for the filename are stored under the
    /// original type whatever they declare.
    pub fn push(&mut self, frame: Frame) -> Assembly {
        let store = match self.stores.entry(frame.filename().to_owned()) {
            Entry::Occupied(occupied) => {
                let store = occupied.into_mut();
                if store.data_type() != frame.data_type() {
                    debug!(
                        filename = frame.filename(),
                        stored = %store.data_type(),
                        declared = %frame.data_type(),
                        "data type differs from first chunk; keeping original"
                    );
                }
                store
            }
            Entry::Vacant(vacant) => {
                let data_type = frame.data_type();
                if !data_type.is_known() {
                    match self.unknown_policy {
                        UnknownTypePolicy::Drop => {
                            warn!(
                                filename = frame.filename(),
                                %data_type,
                                "unknown data type on first chunk; dropping"
                            );
                            return Assembly::Dropped { data_type };
                        }
                        UnknownTypePolicy::Reject => {
                            warn!(
                                filename = frame.filename(),
                                %data_type,
                                "unknown data type on first chunk; rejecting"
                            );
                            return Assembly::Rejected {
                                filename: frame.filename().to_owned(),
                                data_type,
                            };
                        }
                        UnknownTypePolicy::Opaque => {}
                    }
                }
                vacant.insert(ChunkStore::new(data_type))
            }
        };

        let sequence = frame.sequence();
        if store.add_chunk(sequence, frame.payload().clone(), frame.is_last())
            == ChunkStatus::Duplicate
        {
            debug!(
                filename = frame.filename(),
                sequence, "duplicate chunk; ignoring"
            );
            return Assembly::Duplicate;
        }

        if let (Some(final_sequence), Some(highest)) =
            (store.final_sequence(), store.highest_sequence())
            && highest > final_sequence
        {
            warn!(
                filename = frame.filename(),
                final_sequence,
                highest,
                "chunk stored beyond the chunk flagged as final"
            );
        }

        let Ok(payload) = store.reconstruct() else {
            return Assembly::Pending;
        };
        let data_type = store.data_type();
        self.stores.remove(frame.filename());
        Assembly::Complete(CompletedFile::new(frame.filename(), data_type, payload))
    }

    /// Number of files with chunks pending.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.stores.len() }

    /// Whether a store exists for `filename`.
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool { self.stores.contains_key(filename) }

    /// Borrow the store for `filename`, if any.
    #[must_use]
    pub fn store(&self, filename: &str) -> Option<&ChunkStore> { self.stores.get(filename) }

    /// Policy applied to unrecognised data types.
    #[must_use]
    pub const fn unknown_policy(&self) -> UnknownTypePolicy { self.unknown_policy }

    /// Drop every in-flight store, returning how many were discarded.
    pub fn discard_all(&mut self) -> usize {
        let discarded = self.stores.len();
        self.stores.clear();
        discarded
    }
}
