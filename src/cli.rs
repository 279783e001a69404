//! Command line interface for the `chunkstream` receiver.
//!
//! Also compiled by `build.rs` to render the man page, so it must not depend
//! on the rest of the crate.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};

/// Command line arguments for the `chunkstream` binary.
#[derive(Debug, Parser)]
#[command(
    name = "chunkstream",
    version,
    about = "Receive chunked file uploads over TCP and store them by type"
)]
pub struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:5678")]
    pub bind: SocketAddr,

    /// Directory that receives completed files.
    #[arg(short, long, default_value = "uploads")]
    pub output_dir: PathBuf,

    /// Bytes requested from the socket per read.
    #[arg(long, default_value_t = 4096)]
    pub read_size: usize,

    /// Largest payload a single frame may declare, in bytes.
    #[arg(long)]
    pub max_payload: Option<usize>,

    /// Handling of files whose first chunk has an unrecognised data type.
    #[arg(long, value_enum, default_value_t = UnknownTypes::Drop)]
    pub unknown_types: UnknownTypes,

    /// JPEG files held in memory before the oldest is dropped.
    #[arg(long, default_value_t = 10)]
    pub queue_depth: usize,

    /// Worker tasks accepting connections. Defaults to the CPU count.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// Values accepted by `--unknown-types`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnknownTypes {
    /// Log and discard the chunk without replying.
    Drop,
    /// Discard the chunk and send a negative acknowledgment.
    Reject,
    /// Store the file as opaque bytes.
    Opaque,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::{Cli, UnknownTypes};

    #[test]
    fn defaults_listen_on_5678() {
        let cli = Cli::parse_from(["chunkstream"]);
        assert_eq!(cli.bind.to_string(), "0.0.0.0:5678");
        assert_eq!(cli.output_dir.to_str(), Some("uploads"));
        assert_eq!(cli.read_size, 4096);
        assert_eq!(cli.queue_depth, 10);
        assert_eq!(cli.unknown_types, UnknownTypes::Drop);
        assert!(cli.max_payload.is_none());
        assert!(cli.metrics_addr.is_none());
    }

    #[rstest]
    #[case("drop", UnknownTypes::Drop)]
    #[case("reject", UnknownTypes::Reject)]
    #[case("opaque", UnknownTypes::Opaque)]
    fn parses_unknown_type_policy(#[case] arg: &str, #[case] expected: UnknownTypes) {
        let cli = Cli::parse_from(["chunkstream", "--unknown-types", arg]);
        assert_eq!(cli.unknown_types, expected);
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "chunkstream",
            "--bind",
            "127.0.0.1:9000",
            "-o",
            "/tmp/in",
            "--max-payload",
            "65536",
            "--workers",
            "2",
            "--metrics-addr",
            "127.0.0.1:9100",
        ]);
        assert_eq!(cli.bind.port(), 9000);
        assert_eq!(cli.output_dir.to_str(), Some("/tmp/in"));
        assert_eq!(cli.max_payload, Some(65536));
        assert_eq!(cli.workers, Some(2));
        assert_eq!(cli.metrics_addr.map(|a| a.port()), Some(9100));
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(Cli::try_parse_from(["chunkstream", "--bind", "nowhere"]).is_err());
    }
}
