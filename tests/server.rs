//! End-to-end uploads against a running [`Server`](chunkstream::Server).

use std::time::Duration;

use chunkstream::{
    DataType,
    Dispatcher,
    UnknownTypePolicy,
    client::{ClientError, Uploader},
    config::SessionConfig,
    sink::{FileSink, from_fn},
};
use chunkstream_testing::{RecordingSink, encode_frames, frame, spawn_server};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

fn recording_dispatcher(sink: &RecordingSink) -> Dispatcher {
    Dispatcher::builder()
        .route(DataType::Jpeg, sink.clone())
        .route(DataType::Bin, sink.clone())
        .route(DataType::Csv, sink.clone())
        .build()
}

#[tokio::test]
async fn uploaded_file_is_reassembled_and_acknowledged() {
    let sink = RecordingSink::default();
    let server = spawn_server(recording_dispatcher(&sink), SessionConfig::default()).await;
    let data: Vec<u8> = (0..5000_usize)
        .map(|i| u8::try_from(i % 251).expect("below 256"))
        .collect();

    let mut uploader = Uploader::connect(server.addr()).await.expect("connect");
    timeout(WAIT, uploader.upload("scan.bin", DataType::Bin, data.clone()))
        .await
        .expect("upload timed out")
        .expect("upload succeeds");
    drop(uploader);

    let files = sink.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename(), "scan.bin");
    assert_eq!(files[0].payload().as_ref(), data.as_slice());
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn concurrent_connections_do_not_share_filenames() {
    let sink = RecordingSink::default();
    let server = spawn_server(recording_dispatcher(&sink), SessionConfig::default()).await;

    // Both peers use the same filename; each connection reassembles its own.
    let uploads = (0..4_u8).map(|peer| {
        let addr = server.addr();
        tokio::spawn(async move {
            let mut uploader = Uploader::connect(addr).await?.chunk_size(7);
            uploader
                .upload("frame.jpg", DataType::Jpeg, vec![peer; 100])
                .await
        })
    });
    let results = timeout(WAIT, futures::future::join_all(uploads))
        .await
        .expect("uploads timed out");
    for result in results {
        result
            .expect("join upload task")
            .expect("upload succeeds");
    }

    let mut payloads: Vec<u8> = sink.files().iter().map(|f| f.payload()[0]).collect();
    payloads.sort_unstable();
    assert_eq!(payloads, [0, 1, 2, 3]);
    assert!(
        sink.files()
            .iter()
            .all(|f| f.payload().iter().all(|&b| b == f.payload()[0]))
    );
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn interleaved_files_on_one_connection() {
    let sink = RecordingSink::default();
    let server = spawn_server(recording_dispatcher(&sink), SessionConfig::default()).await;

    let mut stream = TcpStream::connect(server.addr()).await.expect("connect");
    let wire = encode_frames(&[
        frame("a.csv", DataType::Csv, 0, false, b"1,2\n"),
        frame("b.jpg", DataType::Jpeg, 1, true, b"\xd9"),
        frame("a.csv", DataType::Csv, 1, true, b"3,4\n"),
        frame("b.jpg", DataType::Jpeg, 0, false, b"\xff\xd8"),
    ]);
    stream.write_all(&wire).await.expect("write frames");
    stream.shutdown().await.expect("close write half");
    let mut acks = String::new();
    timeout(WAIT, stream.read_to_string(&mut acks))
        .await
        .expect("read timed out")
        .expect("read acks");

    assert_eq!(
        acks,
        "File 'a.csv' received and processed successfully.File 'b.jpg' received and processed \
         successfully."
    );
    let files = sink.files();
    assert_eq!(files[0].payload().as_ref(), b"1,2\n3,4\n");
    assert_eq!(files[1].payload().as_ref(), b"\xff\xd8\xd9");
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn corrupt_stream_closes_only_its_connection() {
    let sink = RecordingSink::default();
    let server = spawn_server(recording_dispatcher(&sink), SessionConfig::default()).await;

    let mut bad = TcpStream::connect(server.addr()).await.expect("connect");
    let mut wire = encode_frames(&[frame("early.bin", DataType::Bin, 0, true, b"kept")]);
    wire.extend_from_slice(&[1, 0xc0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    bad.write_all(&wire).await.expect("write frames");
    let mut reply = String::new();
    timeout(WAIT, bad.read_to_string(&mut reply))
        .await
        .expect("server should close the corrupt connection")
        .expect("read reply");
    assert_eq!(reply, "File 'early.bin' received and processed successfully.");

    let mut good = Uploader::connect(server.addr()).await.expect("connect");
    timeout(WAIT, good.upload("late.bin", DataType::Bin, &b"ok"[..]))
        .await
        .expect("upload timed out")
        .expect("other connections keep working");

    assert_eq!(sink.filenames(), ["early.bin", "late.bin"]);
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn failing_sink_still_acknowledges() {
    let dispatcher = Dispatcher::builder()
        .route(
            DataType::Jpeg,
            from_fn(|_| Err(chunkstream::sink::SinkError::Rejected("bad JPEG".into()))),
        )
        .build();
    let server = spawn_server(dispatcher, SessionConfig::default()).await;

    let mut uploader = Uploader::connect(server.addr()).await.expect("connect");
    let result = timeout(WAIT, uploader.upload("x.jpg", DataType::Jpeg, &b"nope"[..]))
        .await
        .expect("upload timed out");
    assert!(result.is_ok(), "ack is independent of sink outcome: {result:?}");
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn file_sink_writes_into_output_directory() {
    let scratch = TempDir::new().expect("create temp dir");
    let dir = scratch.path().join("uploads");
    let dispatcher = Dispatcher::builder()
        .route(DataType::Csv, FileSink::new(&dir))
        .build();
    let server = spawn_server(dispatcher, SessionConfig::default()).await;

    let mut uploader = Uploader::connect(server.addr()).await.expect("connect");
    timeout(WAIT, uploader.upload("../points.csv", DataType::Csv, &b"0,0,1\n"[..]))
        .await
        .expect("upload timed out")
        .expect("upload succeeds");

    let stored = tokio::fs::read(dir.join("points.csv"))
        .await
        .expect("file stored under its final component");
    assert_eq!(stored, b"0,0,1\n");
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn empty_upload_returns_without_waiting_for_an_acknowledgment() {
    let sink = RecordingSink::default();
    let server = spawn_server(recording_dispatcher(&sink), SessionConfig::default()).await;

    let mut uploader = Uploader::connect(server.addr()).await.expect("connect");
    let result = timeout(WAIT, uploader.upload("empty.bin", DataType::Bin, &b""[..]))
        .await
        .expect("empty upload must not wait for a reply");
    assert!(matches!(result, Err(ClientError::EmptyFile { .. })));

    uploader
        .upload("after.bin", DataType::Bin, &b"\x01"[..])
        .await
        .expect("connection stays usable");
    assert_eq!(sink.filenames(), ["after.bin"]);
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn rejecting_receiver_fails_the_upload() {
    let sink = RecordingSink::default();
    let config = SessionConfig {
        unknown_type_policy: UnknownTypePolicy::Reject,
        ..SessionConfig::default()
    };
    let server = spawn_server(recording_dispatcher(&sink), config).await;

    let mut uploader = Uploader::connect(server.addr()).await.expect("connect");
    let result = timeout(WAIT, uploader.upload("odd.raw", DataType::Unknown(0x09), &b"??"[..]))
        .await
        .expect("rejection must not hang");
    assert!(matches!(
        result,
        Err(ClientError::Rejected { data_type: DataType::Unknown(0x09), .. })
    ));
    assert!(sink.is_empty());
    server.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn upload_reports_connection_refused() {
    let addr = chunkstream_testing::free_listener()
        .local_addr()
        .expect("listener address");
    // The listener above is dropped, so nothing accepts on `addr`.
    let err = Uploader::connect(addr).await.expect_err("nothing listening");
    assert!(matches!(err, ClientError::Io(_)));
}
