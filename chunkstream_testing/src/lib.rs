//! Utilities for exercising `chunkstream` sessions and servers in tests.
//!
//! The helpers encode frames to wire bytes, drive a [`Session`] over an
//! in-memory `tokio::io::duplex` stream, record dispatched files and run a
//! real [`Server`] on a loopback port.
//!
//! ```rust
//! use chunkstream::{DataType, Dispatcher, config::SessionConfig};
//! use chunkstream_testing::{RecordingSink, drive_session, encode_frames, frame};
//!
//! # async fn example() -> std::io::Result<()> {
//! let sink = RecordingSink::default();
//! let dispatcher = Dispatcher::builder().route(DataType::Csv, sink.clone()).build();
//! let input = encode_frames(&[frame("a.csv", DataType::Csv, 0, true, b"x,y")]);
//! let outcome = drive_session(SessionConfig::default(), dispatcher, vec![input]).await?;
//! assert_eq!(sink.filenames(), ["a.csv"]);
//! assert!(outcome.result.is_ok());
//! # Ok(())
//! # }
//! ```
//!
//! [`Session`]: chunkstream::Session
//! [`Server`]: chunkstream::Server

pub mod helpers;
pub mod server;
pub mod sinks;

pub use helpers::{SessionOutcome, drive_session, encode_frames, file_frames, frame};
pub use server::{RunningServer, free_listener, spawn_server};
pub use sinks::RecordingSink;
