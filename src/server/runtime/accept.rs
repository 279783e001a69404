//! Accept-loop utilities for server runtime.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    config::SessionConfig,
    dispatch::Dispatcher,
    server::connection::{ConnectionContext, spawn_connection_task},
    session::ConnectionId,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub dispatcher: Arc<Dispatcher>,
    pub session: SessionConfig,
    pub next_id: Arc<AtomicU64>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accepts incoming connections and spawns a session task for each.
///
/// Failures to accept a connection trigger an exponential back-off governed
/// by `options.backoff`; a successful accept resets the delay. The loop
/// terminates when `options.shutdown` is cancelled, and all spawned tasks are
/// tracked by `options.tracker` for graceful shutdown.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + 'static,
{
    let backoff = options.backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(&*listener, &options, &backoff, delay).await {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<L>(
    listener: &L,
    options: &AcceptLoopOptions,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener,
{
    select! {
        biased;

        () = options.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                let id = ConnectionId::new(options.next_id.fetch_add(1, Ordering::Relaxed));
                spawn_connection_task(
                    stream,
                    ConnectionContext {
                        id,
                        peer_addr: Some(peer_addr),
                        config: options.session,
                        dispatcher: Arc::clone(&options.dispatcher),
                    },
                    &options.tracker,
                );
                backoff.initial_delay
            }
            Err(e) => {
                crate::metrics::inc_errors("accept");
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                (delay * 2).min(backoff.max_delay)
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Listener whose every accept fails, recording how often it was polled.
    #[derive(Default)]
    struct FailingListener {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AcceptListener for FailingListener {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::other("injected accept failure"))
        }

        fn local_addr(&self) -> io::Result<SocketAddr> { Ok(([127, 0, 0, 1], 0).into()) }
    }

    fn options(shutdown: CancellationToken, backoff: BackoffConfig) -> AcceptLoopOptions {
        AcceptLoopOptions {
            dispatcher: Arc::new(Dispatcher::default()),
            session: SessionConfig::default(),
            next_id: Arc::new(AtomicU64::new(1)),
            shutdown,
            tracker: TaskTracker::new(),
            backoff,
        }
    }

    #[tokio::test]
    async fn accept_errors_back_off_and_retry() {
        let listener = Arc::new(FailingListener::default());
        let token = CancellationToken::new();
        let backoff = BackoffConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        let handle = tokio::spawn(accept_loop(
            Arc::clone(&listener),
            options(token.clone(), backoff),
        ));

        sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.expect("accept loop join");

        let attempts = listener.attempts.load(Ordering::SeqCst);
        assert!(attempts >= 2, "expected retries, saw {attempts}");
        // With delays capped at 4ms, 50ms cannot hold more than ~50 attempts.
        assert!(attempts <= 60, "back-off not applied, saw {attempts}");
    }

    #[tokio::test]
    async fn cancelled_loop_exits_before_accepting() {
        let listener = Arc::new(FailingListener::default());
        let token = CancellationToken::new();
        token.cancel();

        accept_loop(
            Arc::clone(&listener),
            options(token, BackoffConfig::default()),
        )
        .await;

        assert_eq!(listener.attempts.load(Ordering::SeqCst), 0);
    }
}
