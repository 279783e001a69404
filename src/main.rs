//! `chunkstream` receiver binary.
//!
//! Listens for chunked uploads and stores completed files under the output
//! directory. JPEG files pass through a drop-oldest queue first so a slow
//! disk cannot stall connections; other types are written directly.

mod cli;

use std::{error::Error, net::SocketAddr};

use chunkstream::{
    DataType,
    Dispatcher,
    config::{ServerConfig, SessionConfig},
    reassembly::UnknownTypePolicy,
    server::Server,
    sink::{FileSink, QueueReceiver, Sink, bounded_queue},
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    install_metrics_exporter(cli.metrics_addr)?;
    let config = server_config(&cli);

    let (queue, queued) = bounded_queue(config.queue_depth);
    let dispatcher = Dispatcher::builder()
        .route(DataType::Jpeg, queue)
        .route(DataType::Bin, FileSink::new(&config.output_dir))
        .route(DataType::Csv, FileSink::new(&config.output_dir))
        .fallback(FileSink::new(&config.output_dir))
        .build();
    tokio::spawn(store_queued(queued, FileSink::new(&config.output_dir)));

    let mut server = Server::new(dispatcher).with_config(config.session);
    if let Some(workers) = cli.workers {
        server = server.workers(workers);
    }
    info!(output_dir = %config.output_dir.display(), "storing uploads");
    server.bind(config.bind)?.run().await?;
    Ok(())
}

fn server_config(cli: &cli::Cli) -> ServerConfig {
    let defaults = SessionConfig::default();
    ServerConfig {
        bind: cli.bind,
        output_dir: cli.output_dir.clone(),
        queue_depth: cli.queue_depth,
        session: SessionConfig {
            read_chunk_size: cli.read_size,
            max_payload_length: cli.max_payload.unwrap_or(defaults.max_payload_length),
            unknown_type_policy: match cli.unknown_types {
                cli::UnknownTypes::Drop => UnknownTypePolicy::Drop,
                cli::UnknownTypes::Reject => UnknownTypePolicy::Reject,
                cli::UnknownTypes::Opaque => UnknownTypePolicy::Opaque,
            },
        }
        .normalized(),
    }
}

/// Write queued files to disk until every queue sender is gone.
async fn store_queued(mut queued: QueueReceiver, storage: FileSink) {
    while let Some(file) = queued.recv().await {
        if let Err(err) = storage.deliver(&file).await {
            warn!(filename = file.filename(), error = %err, "failed to store queued file");
        }
    }
    let dropped = queued.dropped();
    if dropped > 0 {
        warn!(dropped, "queue closed after dropping files");
    }
}

#[cfg(feature = "metrics")]
fn install_metrics_exporter(addr: Option<SocketAddr>) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "serving Prometheus metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics_exporter(addr: Option<SocketAddr>) -> Result<(), Box<dyn Error>> {
    if addr.is_some() {
        warn!("built without the `metrics` feature; ignoring --metrics-addr");
    }
    Ok(())
}
