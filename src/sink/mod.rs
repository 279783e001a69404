//! Consumers of reassembled files.
//!
//! A [`Sink`] receives every completed file routed to it by the
//! [`Dispatcher`](crate::dispatch::Dispatcher). Sinks are shared by all
//! connections, so implementations must be internally synchronised. Failures
//! are reported to the dispatcher, which logs them; they never reach the
//! peer or tear down the connection.

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::reassembly::CompletedFile;

mod file;
mod queue;

pub use file::FileSink;
pub use queue::{DEFAULT_QUEUE_DEPTH, QueueReceiver, QueueSink, bounded_queue};

/// Errors reported by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the payload failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The filename cannot be used by this sink.
    #[error("unusable filename {filename:?}")]
    InvalidFilename {
        /// Filename as received.
        filename: String,
    },

    /// The payload could not be processed.
    #[error("payload rejected: {0}")]
    Rejected(String),

    /// The consumer behind the sink has gone away.
    #[error("sink closed")]
    Closed,
}

/// Destination for reassembled files of one or more data types.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Process one completed file.
    ///
    /// Long-running or blocking work should be moved off the connection task,
    /// for example with `tokio::task::spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the payload cannot be handled.
    async fn deliver(&self, file: &CompletedFile) -> Result<(), SinkError>;
}

/// Sink backed by a synchronous closure.
pub struct FnSink<F>(F);

/// Wrap `f` as a [`Sink`].
///
/// # Examples
///
/// ```
/// use chunkstream::sink::{Sink, SinkError, from_fn};
///
/// let sink = from_fn(|file| {
///     if file.payload().is_empty() {
///         return Err(SinkError::Rejected("empty".into()));
///     }
///     Ok(())
/// });
/// # let _: &dyn Sink = &sink;
/// ```
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&CompletedFile) -> Result<(), SinkError> + Send + Sync,
{
    FnSink(f)
}

#[async_trait]
impl<F> Sink for FnSink<F>
where
    F: Fn(&CompletedFile) -> Result<(), SinkError> + Send + Sync,
{
    async fn deliver(&self, file: &CompletedFile) -> Result<(), SinkError> { (self.0)(file) }
}
