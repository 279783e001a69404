//! Configuration for sessions and the server binary.
//!
//! Every field has a default matching the reference deployment: listen on
//! `0.0.0.0:5678`, read the socket 4096 bytes at a time, write files into
//! `uploads/`, and keep at most ten files queued for slow consumers.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use crate::{codec::MAX_PAYLOAD_LENGTH, reassembly::UnknownTypePolicy, sink::DEFAULT_QUEUE_DEPTH};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 5678;
/// Default size of each transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;
/// Default payload size per frame when sending.
pub const DEFAULT_SEND_CHUNK_SIZE: usize = 1024;
/// Default directory for stored files.
pub const DEFAULT_OUTPUT_DIR: &str = "uploads";

/// Per-connection settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bytes requested from the transport per read. Never zero.
    pub read_chunk_size: usize,
    /// Largest payload a single frame may declare.
    pub max_payload_length: usize,
    /// Handling of files whose first chunk has an unrecognised type.
    pub unknown_type_policy: UnknownTypePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_payload_length: MAX_PAYLOAD_LENGTH,
            unknown_type_policy: UnknownTypePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Clamp fields to usable values.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunkstream::config::SessionConfig;
    ///
    /// let cfg = SessionConfig {
    ///     read_chunk_size: 0,
    ///     ..SessionConfig::default()
    /// }
    /// .normalized();
    /// assert_eq!(cfg.read_chunk_size, 1);
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.read_chunk_size = self.read_chunk_size.max(1);
        self.max_payload_length = self.max_payload_length.min(MAX_PAYLOAD_LENGTH);
        self
    }
}

/// Settings used by the `chunkstream` binary to assemble a server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Directory receiving stored files.
    pub output_dir: PathBuf,
    /// Depth of the drop-oldest queue in front of `Jpeg` storage.
    pub queue_depth: usize,
    /// Per-connection settings.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            session: SessionConfig::default(),
        }
    }
}
