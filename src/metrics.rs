//! Metric helpers for `chunkstream`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops, so call sites stay unconditional.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "chunkstream_connections_active";
/// Name of the counter tracking parsed frames.
pub const FRAMES_RECEIVED: &str = "chunkstream_frames_received_total";
/// Name of the counter tracking reassembled files.
pub const FILES_COMPLETED: &str = "chunkstream_files_completed_total";
/// Name of the counter tracking ignored duplicate chunks.
pub const DUPLICATE_CHUNKS: &str = "chunkstream_duplicate_chunks_total";
/// Name of the counter tracking error occurrences, labelled by `error_type`.
pub const ERRORS_TOTAL: &str = "chunkstream_errors_total";
/// Name of the counter tracking panics in connection tasks.
pub const CONNECTION_PANICS: &str = "chunkstream_connection_panics_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a parsed frame.
pub fn inc_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_RECEIVED).increment(1);
}

/// Record a completed file, labelled by its data type.
pub fn inc_files_completed(data_type: &str) {
    #[cfg(feature = "metrics")]
    counter!(FILES_COMPLETED, "data_type" => data_type.to_owned()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = data_type;
}

/// Record a duplicate chunk.
pub fn inc_duplicates() {
    #[cfg(feature = "metrics")]
    counter!(DUPLICATE_CHUNKS).increment(1);
}

/// Record an error occurrence of the given category.
pub fn inc_errors(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "error_type" => error_type).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = error_type;
}

/// Record a sink failure.
pub fn inc_sink_errors() { inc_errors("sink"); }

/// Record a chunk dropped or refused for its data type.
pub fn inc_rejected() { inc_errors("unknown_type"); }

/// Record a panic in a connection task.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
