//! Sinks that record what they receive.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chunkstream::{
    CompletedFile,
    sink::{Sink, SinkError},
};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Recorded {
    files: Mutex<Vec<CompletedFile>>,
    changed: Notify,
}

/// Cloneable sink keeping every delivered file in arrival order.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    inner: Arc<Recorded>,
}

impl RecordingSink {
    fn lock(&self) -> MutexGuard<'_, Vec<CompletedFile>> {
        self.inner.files.lock().expect("recording sink poisoned")
    }

    /// Files delivered so far.
    #[must_use]
    pub fn files(&self) -> Vec<CompletedFile> { self.lock().clone() }

    /// Names of files delivered so far.
    #[must_use]
    pub fn filenames(&self) -> Vec<String> {
        self.lock().iter().map(|f| f.filename().to_owned()).collect()
    }

    /// Number of files delivered so far.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().len() }

    /// Whether nothing has been delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    /// Wait until at least `count` files have been delivered.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let changed = self.inner.changed.notified();
            if self.len() >= count {
                return;
            }
            changed.await;
        }
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, file: &CompletedFile) -> Result<(), SinkError> {
        self.lock().push(file.clone());
        self.inner.changed.notify_waiters();
        Ok(())
    }
}
