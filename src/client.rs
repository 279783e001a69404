//! Sender side of the protocol.
//!
//! [`split_file`] cuts a file into frames of at most `chunk_size` payload
//! bytes, numbered from zero with the final chunk flagged. [`Uploader`]
//! writes those frames to a connection and reads back the acknowledgment.

use std::{io, net::SocketAddr, string::FromUtf8Error};

use bytes::Bytes;
use futures::SinkExt as _;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::FramedWrite;
use tracing::debug;

use crate::{
    codec::{CodecError, FrameCodec},
    dispatch::Acknowledgment,
    frame::{DataType, Frame, FrameError},
};

/// Errors raised while uploading a file.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A frame could not be built from the input.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Writing frames failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Connecting or reading the acknowledgment failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The acknowledgment bytes are not UTF-8.
    #[error("acknowledgment is not valid UTF-8: {0}")]
    InvalidAcknowledgment(#[from] FromUtf8Error),

    /// Empty files produce no frames, so the receiver would never answer.
    #[error("cannot upload empty file {filename:?}")]
    EmptyFile {
        /// Name of the file that was not sent.
        filename: String,
    },

    /// The receiver refused the file's data type.
    #[error("receiver rejected {filename:?}: unknown data type {data_type}")]
    Rejected {
        /// Name of the refused file.
        filename: String,
        /// Type byte the receiver did not recognise.
        data_type: DataType,
    },

    /// The receiver answered with something other than the expected text.
    #[error("unexpected acknowledgment {received:?}, expected {expected:?}")]
    UnexpectedAcknowledgment {
        /// Text the receiver sends on success.
        expected: String,
        /// Text actually received.
        received: String,
    },
}

/// Split `data` into frames of at most `chunk_size` payload bytes.
///
/// Sequence numbers start at zero and only the final frame is flagged as
/// last. Empty input yields no frames, so nothing is sent for an empty file.
/// A `chunk_size` of zero is treated as one.
///
/// # Errors
///
/// Returns [`FrameError::FilenameTooLong`] if `filename` exceeds 255 bytes.
///
/// # Examples
///
/// ```
/// use chunkstream::{DataType, client::split_file};
///
/// let frames = split_file("a.csv", DataType::Csv, &b"abcde"[..], 2).unwrap();
/// let payloads: Vec<&[u8]> = frames.iter().map(|f| f.payload().as_ref()).collect();
/// assert_eq!(payloads, [&b"ab"[..], b"cd", b"e"]);
/// assert!(frames[2].is_last());
/// assert_eq!(frames[2].sequence(), 2);
/// ```
pub fn split_file(
    filename: &str,
    data_type: DataType,
    data: impl Into<Bytes>,
    chunk_size: usize,
) -> Result<Vec<Frame>, FrameError> {
    let data = data.into();
    let chunk_size = chunk_size.max(1);
    let count = data.len().div_ceil(chunk_size);
    (0..count)
        .map(|index| {
            let start = index * chunk_size;
            let end = (start + chunk_size).min(data.len());
            let sequence =
                u32::try_from(index).map_err(|_| FrameError::PayloadTooLarge { len: data.len() })?;
            Frame::new(
                filename,
                data_type,
                sequence,
                index + 1 == count,
                data.slice(start..end),
            )
        })
        .collect()
}

/// Connection to a receiver.
#[derive(Debug)]
pub struct Uploader<S = TcpStream> {
    stream: S,
    chunk_size: usize,
}

impl Uploader<TcpStream> {
    /// Connect to a receiver at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection cannot be established.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> Uploader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            chunk_size: crate::config::DEFAULT_SEND_CHUNK_SIZE,
        }
    }

    /// Set the payload size of each frame.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Write every frame of `data` and flush the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the frames cannot be built or written.
    pub async fn send_file(
        &mut self,
        filename: &str,
        data_type: DataType,
        data: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        let frames = split_file(filename, data_type, data, self.chunk_size)?;
        debug!(filename, frames = frames.len(), "sending file");
        self.send_frames(frames).await
    }

    /// Write pre-built frames in order and flush the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Codec`] if writing fails.
    pub async fn send_frames(
        &mut self,
        frames: impl IntoIterator<Item = Frame>,
    ) -> Result<(), ClientError> {
        let mut writer = FramedWrite::new(&mut self.stream, FrameCodec::default());
        for frame in frames {
            writer.feed(frame).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Read acknowledgment text until it equals one of `candidates`.
    ///
    /// Acknowledgments carry no delimiter, so bytes are read one at a time
    /// and nothing past the acknowledgment is consumed. Reading stops early
    /// once the text is no longer a prefix of any candidate, or when the
    /// stream ends, and whatever was read is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if reading fails or the stream ends before
    /// any byte arrives, and [`ClientError::InvalidAcknowledgment`] if the
    /// bytes are not UTF-8.
    pub async fn read_acknowledgment(&mut self, candidates: &[&str]) -> Result<String, ClientError> {
        let mut buf = Vec::new();
        while !candidates.iter().any(|c| c.as_bytes() == buf.as_slice())
            && candidates.iter().any(|c| c.as_bytes().starts_with(&buf))
        {
            let mut byte = [0_u8; 1];
            if self.stream.read(&mut byte).await? == 0 {
                if buf.is_empty() {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                }
                break;
            }
            buf.extend_from_slice(&byte);
        }
        Ok(String::from_utf8(buf)?)
    }

    /// Send a file and wait for the receiver to confirm it.
    ///
    /// A receiver that drops unknown data types never answers, so uploading
    /// an unrecognised type waits until the connection closes. A rejecting
    /// receiver sends one refusal per chunk; only the first is read.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyFile`] without sending anything if `data`
    /// is empty, [`ClientError::Rejected`] if the receiver refuses the data
    /// type, and [`ClientError::UnexpectedAcknowledgment`] for any other
    /// answer.
    pub async fn upload(
        &mut self,
        filename: &str,
        data_type: DataType,
        data: impl Into<Bytes>,
    ) -> Result<(), ClientError> {
        let frames = split_file(filename, data_type, data, self.chunk_size)?;
        if frames.is_empty() {
            return Err(ClientError::EmptyFile {
                filename: filename.to_owned(),
            });
        }
        debug!(filename, frames = frames.len(), "uploading file");
        self.send_frames(frames).await?;

        let expected = Acknowledgment::received(filename);
        let refused = Acknowledgment::rejected(filename, data_type);
        let received = self
            .read_acknowledgment(&[expected.as_str(), refused.as_str()])
            .await?;
        if received == expected.as_str() {
            Ok(())
        } else if received == refused.as_str() {
            Err(ClientError::Rejected {
                filename: filename.to_owned(),
                data_type,
            })
        } else {
            Err(ClientError::UnexpectedAcknowledgment {
                expected: expected.as_str().to_owned(),
                received,
            })
        }
    }

    /// Consume the uploader, returning the underlying stream.
    pub fn into_inner(self) -> S { self.stream }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tokio::io::{AsyncWriteExt, duplex};

    use super::*;
    use crate::{buffer::ByteBuffer, codec::FrameParser};

    #[rstest]
    #[case(0, 1024, 0)]
    #[case(1, 1024, 1)]
    #[case(1024, 1024, 1)]
    #[case(1025, 1024, 2)]
    #[case(10, 3, 4)]
    fn split_counts(#[case] len: usize, #[case] chunk: usize, #[case] frames: usize) {
        let parts = split_file("f", DataType::Bin, vec![7_u8; len], chunk).expect("split");
        assert_eq!(parts.len(), frames);
        if let Some(last) = parts.last() {
            assert!(last.is_last());
            assert!(parts[..parts.len() - 1].iter().all(|f| !f.is_last()));
        }
        let total: usize = parts.iter().map(|f| f.payload().len()).sum();
        assert_eq!(total, len);
    }

    #[test]
    fn zero_chunk_size_is_treated_as_one() {
        let parts = split_file("z", DataType::Csv, &b"abc"[..], 0).expect("split");
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn long_filenames_are_refused() {
        let name = "n".repeat(256);
        assert!(matches!(
            split_file(&name, DataType::Bin, &b"x"[..], 4),
            Err(FrameError::FilenameTooLong { len: 256 })
        ));
    }

    #[tokio::test]
    async fn send_file_writes_parsable_frames() {
        let (client, mut server) = duplex(4096);
        let mut uploader = Uploader::new(client).chunk_size(4);
        uploader
            .send_file("d.bin", DataType::Bin, &b"0123456789"[..])
            .await
            .expect("send");
        drop(uploader);

        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.expect("read frames");
        let mut buffer = ByteBuffer::from(raw.as_slice());
        let parser = FrameParser::default();
        let mut sequences = Vec::new();
        while let Some(frame) = parser.next_frame(&mut buffer).expect("valid frames") {
            sequences.push((frame.sequence(), frame.is_last()));
        }
        assert_eq!(sequences, [(0, false), (1, false), (2, true)]);
    }

    #[tokio::test]
    async fn upload_rejects_unexpected_acknowledgment() {
        let (client, mut server) = duplex(4096);
        let expected_len = Acknowledgment::received("x.csv").as_bytes().len();
        server
            .write_all("?".repeat(expected_len).as_bytes())
            .await
            .expect("write reply");

        let err = Uploader::new(client)
            .upload("x.csv", DataType::Csv, &b"a,b"[..])
            .await
            .expect_err("mismatched acknowledgment");
        assert!(matches!(
            err,
            ClientError::UnexpectedAcknowledgment { ref received, .. } if received == "?"
        ));
    }

    #[tokio::test]
    async fn upload_refuses_empty_data_without_sending() {
        let (client, mut server) = duplex(4096);
        let mut uploader = Uploader::new(client);

        let err = uploader
            .upload("empty.bin", DataType::Bin, &b""[..])
            .await
            .expect_err("empty data has no frames to acknowledge");
        assert!(matches!(err, ClientError::EmptyFile { ref filename } if filename == "empty.bin"));

        drop(uploader);
        let mut raw = Vec::new();
        server.read_to_end(&mut raw).await.expect("read peer side");
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn upload_reports_rejection_of_a_shorter_reply() {
        let (client, mut server) = duplex(4096);
        let data_type = DataType::Unknown(0x09);
        let nack = Acknowledgment::rejected("odd.raw", data_type);
        assert_ne!(
            nack.as_bytes().len(),
            Acknowledgment::received("odd.raw").as_bytes().len()
        );
        server.write_all(nack.as_bytes()).await.expect("write reply");

        let err = Uploader::new(client)
            .upload("odd.raw", data_type, &b"zz"[..])
            .await
            .expect_err("receiver refused the type");
        assert!(matches!(
            err,
            ClientError::Rejected { ref filename, data_type: DataType::Unknown(0x09) }
                if filename == "odd.raw"
        ));
    }

    #[tokio::test]
    async fn read_acknowledgment_returns_partial_text_at_eof() {
        let (client, mut server) = duplex(64);
        server.write_all(b"File 'a'").await.expect("write reply");
        drop(server);

        let mut uploader = Uploader::new(client);
        let text = uploader
            .read_acknowledgment(&["File 'a' received and processed successfully."])
            .await
            .expect("partial text");
        assert_eq!(text, "File 'a'");
    }
}
