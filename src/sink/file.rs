//! Raw storage of reassembled files.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{Sink, SinkError};
use crate::reassembly::CompletedFile;

/// Writes each completed file into a directory under its received name.
///
/// Only the final path component of the received filename is used, so a
/// peer cannot write outside the configured directory.
#[derive(Clone, Debug)]
pub struct FileSink {
    directory: PathBuf,
}

impl FileSink {
    /// Store files under `directory`, creating it on first use.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory files are written to.
    #[must_use]
    pub fn directory(&self) -> &Path { &self.directory }

    /// Destination path for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::InvalidFilename`] if the filename has no usable
    /// final component (for example `""`, `"."` or `".."`).
    pub fn path_for(&self, filename: &str) -> Result<PathBuf, SinkError> {
        match Path::new(filename).components().next_back() {
            Some(Component::Normal(name)) => Ok(self.directory.join(name)),
            _ => Err(SinkError::InvalidFilename {
                filename: filename.to_owned(),
            }),
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn deliver(&self, file: &CompletedFile) -> Result<(), SinkError> {
        let path = self.path_for(file.filename())?;
        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&path, file.payload()).await?;
        debug!(
            filename = file.filename(),
            path = %path.display(),
            bytes = file.payload().len(),
            "stored file"
        );
        Ok(())
    }
}
