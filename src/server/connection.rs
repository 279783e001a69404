//! Connection handling for [`Server`](super::Server).

use std::{any::Any, fmt, net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::error;
use tokio::net::TcpStream;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, info, info_span};

use crate::{
    config::SessionConfig,
    dispatch::Dispatcher,
    session::{ConnectionId, Session},
};

/// Everything a connection task needs besides its stream.
#[derive(Debug)]
pub(super) struct ConnectionContext {
    pub id: ConnectionId,
    pub peer_addr: Option<SocketAddr>,
    pub config: SessionConfig,
    pub dispatcher: Arc<Dispatcher>,
}

/// Formats a panic payload, preferring its string message.
struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("<non-string panic payload>")
        }
    }
}

/// Keeps the active-connections gauge balanced even if the task panics.
struct ActiveConnection;

impl ActiveConnection {
    fn enter() -> Self {
        crate::metrics::inc_connections();
        Self
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) { crate::metrics::dec_connections(); }
}

/// Spawn a task running a [`Session`] over `stream`, logging and discarding
/// any panics.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    context: ConnectionContext,
    tracker: &TaskTracker,
) {
    let ConnectionContext {
        id,
        peer_addr,
        config,
        dispatcher,
    } = context;
    let span = info_span!("connection", connection_id = %id, ?peer_addr);
    tracker.spawn(
        async move {
            let _active = ActiveConnection::enter();
            info!("connection accepted");
            let session = Session::new(id, config, dispatcher);
            let fut = AssertUnwindSafe(session.run(stream)).catch_unwind();

            match fut.await {
                Ok(Ok(summary)) => info!(
                    files = summary.files_completed,
                    frames = summary.frames,
                    "connection closed"
                ),
                // The session has already logged the cause.
                Ok(Err(_)) => {}
                Err(panic) => {
                    crate::metrics::inc_connection_panics();
                    let panic_msg = PanicMessage(panic.as_ref());
                    // Emit via both `log` and `tracing` for tests that capture either.
                    error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
                    tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
                }
            }
        }
        .instrument(span),
    );
}
