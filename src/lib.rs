//! Receiver for length-prefixed chunked file streams.
//!
//! Peers upload files over TCP as a sequence of frames, each carrying a
//! filename, a data type, a sequence number, a final-chunk flag and a slice of
//! the file. The receiver runs one [`Session`] per connection: bytes are
//! accumulated in a [`ByteBuffer`], cut into [`Frame`]s by the
//! [`FrameParser`], regrouped per filename by the [`Reassembler`] and, once a
//! file is complete, handed to the [`Dispatcher`], which routes it to a
//! [`Sink`](sink::Sink) and produces the acknowledgment sent back to the peer.

pub mod buffer;
pub mod byte_order;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod frame;
pub mod metrics;
pub mod reassembly;
pub mod server;
pub mod session;
pub mod sink;

pub use buffer::{BufferError, ByteBuffer};
pub use codec::{CodecError, FrameCodec, FrameParser};
pub use dispatch::{Acknowledgment, Dispatcher};
pub use frame::{DataType, Frame, FrameError};
pub use reassembly::{Assembly, CompletedFile, Reassembler, UnknownTypePolicy};
pub use server::{Server, ServerError};
pub use session::{ConnectionId, Session, SessionError, SessionSummary};
