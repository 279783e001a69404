//! Builder-style configuration for [`Server`].

use std::sync::Arc;

use tokio::sync::oneshot;

use super::{BackoffConfig, Server, ServerState, Unbound};
use crate::{config::SessionConfig, dispatch::Dispatcher};

mod binding;

impl Server<Unbound> {
    /// Create a server routing completed files through `dispatcher`.
    ///
    /// The worker count defaults to the number of available CPU cores (or 1
    /// if this cannot be determined). Call [`bind`](Self::bind) before
    /// running the server.
    #[must_use]
    pub fn new(dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            dispatcher: dispatcher.into(),
            session: SessionConfig::default(),
            workers,
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<S> Server<S>
where
    S: ServerState,
{
    /// Replace the per-connection settings.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.session = config.normalized();
        self
    }

    /// Set the number of worker tasks accepting connections.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Configure the accept-loop back-off.
    #[must_use]
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config.normalized();
        self
    }

    /// Configure a channel used to signal when the server is ready to accept
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured number of worker tasks.
    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.workers }

    /// Returns the per-connection settings.
    #[must_use]
    pub const fn session_config(&self) -> &SessionConfig { &self.session }
}
