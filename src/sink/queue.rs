//! Bounded hand-off queue that drops the oldest entry on overflow.
//!
//! Used where a slow consumer (a display loop, a publisher) must never
//! stall the connection tasks feeding it: when the queue is full the oldest
//! pending file is discarded to make room.
//!
//! The queue is a [`tokio::sync::broadcast`] channel with a single receiver.
//! Broadcast already overwrites the oldest value when full and reports the
//! loss as [`RecvError::Lagged`]. Its capacity is rounded up to a power of
//! two, so the receiver also skips any file that already has `depth` newer
//! files pending behind it.

use async_trait::async_trait;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, SendError, TryRecvError},
};
use tracing::debug;

use super::{Sink, SinkError};
use crate::reassembly::CompletedFile;

/// Default queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Producer half of [`bounded_queue`].
#[derive(Debug)]
pub struct QueueSink {
    sender: broadcast::Sender<CompletedFile>,
    depth: usize,
}

/// Consumer half of [`bounded_queue`].
#[derive(Debug)]
pub struct QueueReceiver {
    receiver: broadcast::Receiver<CompletedFile>,
    depth: usize,
    dropped: u64,
}

/// Create a queue holding at most `depth` pending files (minimum 1).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use chunkstream::{
///     CompletedFile,
///     DataType,
///     sink::{Sink, bounded_queue},
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (sink, mut receiver) = bounded_queue(1);
/// for name in ["a.jpg", "b.jpg"] {
///     let file = CompletedFile::new(name, DataType::Jpeg, Bytes::new());
///     sink.deliver(&file).await.unwrap();
/// }
/// assert_eq!(receiver.recv().await.unwrap().filename(), "b.jpg");
/// assert_eq!(receiver.dropped(), 1);
/// # }
/// ```
#[must_use]
pub fn bounded_queue(depth: usize) -> (QueueSink, QueueReceiver) {
    let depth = depth.max(1);
    let (sender, receiver) = broadcast::channel(depth);
    (
        QueueSink { sender, depth },
        QueueReceiver {
            receiver,
            depth,
            dropped: 0,
        },
    )
}

impl QueueSink {
    /// Maximum number of pending files.
    #[must_use]
    pub fn depth(&self) -> usize { self.depth }
}

#[async_trait]
impl Sink for QueueSink {
    async fn deliver(&self, file: &CompletedFile) -> Result<(), SinkError> {
        self.sender
            .send(file.clone())
            .map(|_| ())
            .map_err(|SendError(_)| SinkError::Closed)
    }
}

impl QueueReceiver {
    /// Wait for the next pending file.
    ///
    /// Returns `None` once the sink has been dropped and the queue drained.
    pub async fn recv(&mut self) -> Option<CompletedFile> {
        loop {
            match self.receiver.recv().await {
                Ok(file) => {
                    if let Some(file) = self.keep_if_within_depth(file) {
                        return Some(file);
                    }
                }
                Err(RecvError::Lagged(missed)) => self.record_overwritten(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending file without waiting.
    pub fn try_recv(&mut self) -> Option<CompletedFile> {
        loop {
            match self.receiver.try_recv() {
                Ok(file) => {
                    if let Some(file) = self.keep_if_within_depth(file) {
                        return Some(file);
                    }
                }
                Err(TryRecvError::Lagged(missed)) => self.record_overwritten(missed),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Number of files currently pending.
    #[must_use]
    pub fn len(&self) -> usize { self.receiver.len().min(self.depth) }

    /// Whether no files are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.receiver.is_empty() }

    /// Number of files discarded so far because the queue was full.
    ///
    /// Losses are observed as the receiver reads, so the count covers
    /// everything older than the last file returned.
    #[must_use]
    pub fn dropped(&self) -> u64 { self.dropped }

    fn keep_if_within_depth(&mut self, file: CompletedFile) -> Option<CompletedFile> {
        if self.receiver.len() < self.depth {
            return Some(file);
        }
        self.dropped += 1;
        debug!(
            filename = file.filename(),
            depth = self.depth,
            "queue full; dropped oldest file"
        );
        None
    }

    fn record_overwritten(&mut self, missed: u64) {
        self.dropped += missed;
        debug!(missed, depth = self.depth, "queue full; dropped oldest files");
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;
    use crate::frame::DataType;

    fn file(name: &str) -> CompletedFile {
        CompletedFile::new(name, DataType::Jpeg, Bytes::from_static(b"\xff\xd8"))
    }

    fn drain(receiver: &mut QueueReceiver) -> Vec<String> {
        std::iter::from_fn(|| receiver.try_recv())
            .map(|f| f.filename().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn keeps_newest_entries_when_full() {
        let (sink, mut receiver) = bounded_queue(2);
        for name in ["1.jpg", "2.jpg", "3.jpg", "4.jpg"] {
            sink.deliver(&file(name)).await.expect("queue accepts");
        }

        assert_eq!(receiver.len(), 2);
        assert_eq!(drain(&mut receiver), ["3.jpg", "4.jpg"]);
        assert_eq!(receiver.dropped(), 2);
        assert!(receiver.is_empty());
    }

    #[rstest]
    #[case(3, 5)]
    #[case(5, 12)]
    #[case(10, 10)]
    #[tokio::test]
    async fn depth_is_exact_for_any_size(#[case] depth: usize, #[case] sent: usize) {
        let (sink, mut receiver) = bounded_queue(depth);
        for index in 0..sent {
            sink.deliver(&file(&format!("{index}.jpg")))
                .await
                .expect("queue accepts");
        }

        let expected: Vec<String> = (sent.saturating_sub(depth)..sent)
            .map(|index| format!("{index}.jpg"))
            .collect();
        assert_eq!(drain(&mut receiver), expected);
        assert_eq!(
            receiver.dropped(),
            u64::try_from(sent.saturating_sub(depth)).expect("small count")
        );
    }

    #[tokio::test]
    async fn recv_wakes_when_a_file_arrives() {
        let (sink, mut receiver) = bounded_queue(DEFAULT_QUEUE_DEPTH);
        let consumer = tokio::spawn(async move { receiver.recv().await });

        tokio::task::yield_now().await;
        sink.deliver(&file("late.jpg")).await.expect("queue accepts");

        let received = consumer.await.expect("consumer task").expect("file delivered");
        assert_eq!(received.filename(), "late.jpg");
    }

    #[tokio::test]
    async fn recv_ends_after_sink_drops_and_queue_drains() {
        let (sink, mut receiver) = bounded_queue(4);
        sink.deliver(&file("last.jpg")).await.expect("queue accepts");
        drop(sink);

        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn deliver_fails_once_receiver_is_gone() {
        let (sink, receiver) = bounded_queue(4);
        drop(receiver);
        assert!(matches!(
            sink.deliver(&file("x.jpg")).await,
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn zero_depth_is_raised_to_one() {
        let (sink, _receiver) = bounded_queue(0);
        assert_eq!(sink.depth(), 1);
    }
}
