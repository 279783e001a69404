//! Frame construction and in-memory session driving.

use std::{io, sync::Arc};

use bytes::BytesMut;
use chunkstream::{
    DataType,
    Dispatcher,
    Frame,
    Session,
    SessionError,
    SessionSummary,
    client::split_file,
    codec::encode_frame,
    config::SessionConfig,
    session::ConnectionId,
};
use futures::FutureExt as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Build a frame, panicking on invalid test input.
#[must_use]
pub fn frame(name: &str, data_type: DataType, sequence: u32, is_last: bool, payload: &[u8]) -> Frame {
    Frame::new(name, data_type, sequence, is_last, payload.to_vec()).expect("valid test frame")
}

/// Split `data` the way a sender would, panicking on invalid test input.
#[must_use]
pub fn file_frames(name: &str, data_type: DataType, data: &[u8], chunk_size: usize) -> Vec<Frame> {
    split_file(name, data_type, data.to_vec(), chunk_size).expect("valid test file")
}

/// Concatenate the wire encoding of `frames`.
#[must_use]
pub fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for frame in frames {
        encode_frame(frame, &mut buf).expect("encode test frame");
    }
    buf.to_vec()
}

/// What a driven session returned and what it wrote back.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Result of [`Session::run`].
    pub result: Result<SessionSummary, SessionError>,
    /// Bytes written to the peer, i.e. acknowledgments.
    pub written: Vec<u8>,
}

impl SessionOutcome {
    /// Acknowledgment text written by the session.
    #[must_use]
    pub fn acks(&self) -> String { String::from_utf8_lossy(&self.written).into_owned() }
}

/// Run a [`Session`] over a duplex stream, writing each element of `writes`
/// from the peer side in order and then closing the peer's write half.
///
/// # Errors
///
/// Fails if the peer side cannot write or read, or if the session panics;
/// a panic surfaces as an error whose message begins with
/// `"session task failed"`.
pub async fn drive_session(
    config: SessionConfig,
    dispatcher: Dispatcher,
    writes: Vec<Vec<u8>>,
) -> io::Result<SessionOutcome> {
    let (mut client, server) = duplex(DEFAULT_CAPACITY);
    let session = Session::new(ConnectionId::new(0), config, Arc::new(dispatcher));

    let server_fut = async {
        std::panic::AssertUnwindSafe(session.run(server))
            .catch_unwind()
            .await
            .map_err(|panic| {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic payload>".to_owned());
                io::Error::other(format!("session task failed: {msg}"))
            })
    };

    let client_fut = async {
        for chunk in &writes {
            client.write_all(chunk).await?;
        }
        client.shutdown().await?;

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await?;
        io::Result::Ok(buf)
    };

    let (result, written) = tokio::try_join!(server_fut, client_fut)?;
    Ok(SessionOutcome { result, written })
}
