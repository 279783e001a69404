//! Loopback servers for integration tests.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use chunkstream::{Dispatcher, Server, ServerError, config::SessionConfig};
use rstest::fixture;
use tokio::{sync::oneshot, task::JoinHandle};

/// Returns a bound [`StdTcpListener`] on a free loopback port.
///
/// Keeping the listener bound prevents races where another process claims
/// the port between discovery and use.
#[fixture]
pub fn free_listener() -> StdTcpListener {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .expect("Failed to bind free port listener")
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    /// Address the server accepts connections on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Stop accepting, wait for in-flight connections and return the
    /// server's result.
    ///
    /// # Panics
    ///
    /// Panics if the server task panicked.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let _ = self.shutdown.send(());
        self.handle.await.expect("server task panicked")
    }
}

/// Bind `dispatcher` to a free loopback port and run it until
/// [`RunningServer::shutdown`]. Returns once the server is accepting.
///
/// # Panics
///
/// Panics if binding fails or the server never signals readiness.
pub async fn spawn_server(dispatcher: Dispatcher, config: SessionConfig) -> RunningServer {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = Server::new(dispatcher)
        .with_config(config)
        .workers(2)
        .ready_signal(ready_tx)
        .bind_existing_listener(free_listener())
        .expect("bind test server");
    let addr = server.local_addr().expect("bound server has an address");
    let handle = tokio::spawn(server.run_with_shutdown(async move {
        let _ = shutdown_rx.await;
    }));
    ready_rx.await.expect("server ready signal");
    RunningServer {
        addr,
        shutdown,
        handle,
    }
}
