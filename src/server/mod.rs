//! Tokio-based TCP server running one [`Session`](crate::session::Session)
//! per accepted connection.
//!
//! [`Server`] spawns worker tasks that share a listener and accept
//! connections concurrently. Each connection is handled on its own task with
//! its own buffer and reassembler; only the [`Dispatcher`] and its sinks are
//! shared.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{config::SessionConfig, dispatch::Dispatcher};

/// TCP server for chunked file uploads.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](Server::bind) or
/// [`bind_existing_listener`](Server::bind_existing_listener) before running.
pub struct Server<S = Unbound>
where
    S: ServerState,
{
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) session: SessionConfig,
    pub(crate) workers: usize,
    pub(crate) backoff_config: BackoffConfig,
    /// Single-use readiness notification, sent once every worker has been
    /// spawned.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for server backoff behaviour.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
