//! Per-connection orchestration.
//!
//! A [`Session`] owns everything one connection needs: the receive buffer,
//! the frame parser and the filename-keyed reassembler. It reads from the
//! transport, extracts every complete frame, feeds the reassembler, hands
//! completed files to the shared [`Dispatcher`] and writes acknowledgments
//! back. Nothing in a session is shared with other connections.

use std::{fmt, io, sync::Arc};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    buffer::ByteBuffer,
    codec::{CodecError, FrameParser},
    config::SessionConfig,
    dispatch::{Acknowledgment, Dispatcher},
    reassembly::{Assembly, Reassembler},
};

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "conn-{}", self.0) }
}

/// Errors that end a session early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The byte stream could not be framed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reading from the transport failed.
    #[error("transport read failed: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Category used in logs and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Codec(err) => err.error_type(),
            Self::Io(_) => "io",
        }
    }
}

/// Counters describing a finished session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames parsed.
    pub frames: u64,
    /// Files reassembled and dispatched.
    pub files_completed: u64,
    /// Duplicate chunks ignored.
    pub duplicates: u64,
    /// Chunks dropped or refused for an unknown data type.
    pub rejected: u64,
    /// Unfinished files discarded when the connection ended.
    pub discarded_stores: usize,
    /// Buffered bytes left over when the connection ended.
    pub leftover_bytes: usize,
}

/// State for one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    config: SessionConfig,
    dispatcher: Arc<Dispatcher>,
    parser: FrameParser,
    reassembler: Reassembler,
    buffer: ByteBuffer,
    summary: SessionSummary,
}

impl Session {
    /// Create a session for connection `id`.
    #[must_use]
    pub fn new(id: ConnectionId, config: SessionConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let config = config.normalized();
        Self {
            id,
            config,
            dispatcher,
            parser: FrameParser::new(config.max_payload_length),
            reassembler: Reassembler::new(config.unknown_type_policy),
            buffer: ByteBuffer::with_capacity(config.read_chunk_size),
            summary: SessionSummary::default(),
        }
    }

    /// Identifier of this session's connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId { self.id }

    /// Drive the session until the peer closes the stream or a fatal error
    /// occurs.
    ///
    /// Files completed before a fatal error have already been dispatched
    /// and acknowledged; only state for unfinished files is lost.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Codec`] when the stream cannot be framed and
    /// [`SessionError::Io`] when reading from the transport fails.
    pub async fn run<S>(mut self, mut stream: S) -> Result<SessionSummary, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut chunk = vec![0_u8; self.config.read_chunk_size];
        loop {
            let read = match stream.read(&mut chunk).await {
                Ok(read) => read,
                Err(err) => return Err(self.fail(SessionError::Io(err))),
            };
            if read == 0 {
                break;
            }
            self.buffer.append(&chunk[..read]);
            if let Err(err) = self.process_buffered(&mut stream).await {
                return Err(self.fail(err.into()));
            }
        }
        self.close();
        Ok(self.summary)
    }

    async fn process_buffered<S>(&mut self, stream: &mut S) -> Result<(), CodecError>
    where
        S: AsyncWrite + Unpin,
    {
        while let Some(frame) = self.parser.next_frame(&mut self.buffer)? {
            self.summary.frames += 1;
            crate::metrics::inc_frames();
            debug!(
                connection_id = %self.id,
                filename = frame.filename(),
                sequence = frame.sequence(),
                is_last = frame.is_last(),
                len = frame.payload().len(),
                "frame received"
            );
            match self.reassembler.push(frame) {
                Assembly::Pending => {}
                Assembly::Duplicate => {
                    self.summary.duplicates += 1;
                    crate::metrics::inc_duplicates();
                }
                Assembly::Dropped { .. } => {
                    self.summary.rejected += 1;
                    crate::metrics::inc_rejected();
                }
                Assembly::Rejected {
                    filename,
                    data_type,
                } => {
                    self.summary.rejected += 1;
                    crate::metrics::inc_rejected();
                    let nack = Acknowledgment::rejected(&filename, data_type);
                    self.acknowledge(stream, &nack).await;
                }
                Assembly::Complete(file) => {
                    self.summary.files_completed += 1;
                    crate::metrics::inc_files_completed(&file.data_type().to_string());
                    info!(
                        connection_id = %self.id,
                        filename = file.filename(),
                        data_type = %file.data_type(),
                        len = file.payload().len(),
                        "file reassembled"
                    );
                    let ack = self.dispatcher.dispatch(&file).await;
                    self.acknowledge(stream, &ack).await;
                }
            }
        }
        Ok(())
    }

    async fn acknowledge<S>(&self, stream: &mut S, ack: &Acknowledgment)
    where
        S: AsyncWrite + Unpin,
    {
        let sent = async {
            stream.write_all(ack.as_bytes()).await?;
            stream.flush().await
        }
        .await;
        if let Err(err) = sent {
            crate::metrics::inc_errors("ack");
            warn!(
                connection_id = %self.id,
                error = %err,
                ack = ack.as_str(),
                "failed to send acknowledgment"
            );
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        crate::metrics::inc_errors(err.error_type());
        warn!(
            connection_id = %self.id,
            error = %err,
            error_type = err.error_type(),
            "session terminated"
        );
        self.discard();
        err
    }

    fn close(&mut self) {
        if let Some(eof) = self.parser.pending_eof(self.buffer.peek()) {
            debug!(connection_id = %self.id, reason = %eof, "partial frame at end of stream");
        }
        self.discard();
        debug!(connection_id = %self.id, summary = ?self.summary, "session closed");
    }

    fn discard(&mut self) {
        self.summary.leftover_bytes = self.buffer.len();
        self.summary.discarded_stores = self.reassembler.discard_all();
        if self.summary.discarded_stores > 0 || self.summary.leftover_bytes > 0 {
            info!(
                connection_id = %self.id,
                discarded_stores = self.summary.discarded_stores,
                leftover_bytes = self.summary.leftover_bytes,
                "discarding unfinished transfers"
            );
        }
        self.buffer.clear();
    }
}
