//! Session behaviour driven through `chunkstream_testing`.

use chunkstream::{
    DataType,
    Dispatcher,
    SessionError,
    UnknownTypePolicy,
    codec::{CodecError, FramingError},
    config::SessionConfig,
};
use chunkstream_testing::{RecordingSink, drive_session, encode_frames, file_frames, frame};
use rstest::rstest;

fn dispatcher(sink: &RecordingSink) -> Dispatcher {
    Dispatcher::builder()
        .route(DataType::Jpeg, sink.clone())
        .route(DataType::Bin, sink.clone())
        .route(DataType::Csv, sink.clone())
        .fallback(sink.clone())
        .build()
}

#[rstest]
#[case(1)]
#[case(13)]
#[case(4096)]
#[tokio::test]
async fn out_of_order_chunks_reassemble(#[case] read_chunk_size: usize) {
    let sink = RecordingSink::default();
    let mut frames = file_frames("img.jpg", DataType::Jpeg, b"0123456789abcdef", 3);
    frames.reverse();
    let config = SessionConfig {
        read_chunk_size,
        ..SessionConfig::default()
    };

    let outcome = drive_session(config, dispatcher(&sink), vec![encode_frames(&frames)])
        .await
        .expect("drive session");

    let summary = outcome.result.expect("clean session");
    assert_eq!(summary.frames, 6);
    assert_eq!(summary.files_completed, 1);
    assert_eq!(sink.files()[0].payload().as_ref(), b"0123456789abcdef");
}

#[tokio::test]
async fn header_split_across_writes_is_reassembled() {
    let sink = RecordingSink::default();
    let wire = encode_frames(&[frame("s.bin", DataType::Bin, 0, true, b"split")]);
    let writes = wire.chunks(1).map(<[u8]>::to_vec).collect();

    let outcome = drive_session(SessionConfig::default(), dispatcher(&sink), writes)
        .await
        .expect("drive session");

    assert_eq!(
        outcome.acks(),
        "File 's.bin' received and processed successfully."
    );
    assert_eq!(sink.filenames(), ["s.bin"]);
}

#[tokio::test]
async fn highest_sequence_decides_completion() {
    // The flagged chunk arrives first; a later, higher chunk raises the
    // threshold and the file completes only once the gap below it is filled.
    let sink = RecordingSink::default();
    let wire = encode_frames(&[
        frame("h", DataType::Bin, 1, true, b"B"),
        frame("h", DataType::Bin, 2, false, b"C"),
        frame("h", DataType::Bin, 0, false, b"A"),
    ]);

    let outcome = drive_session(SessionConfig::default(), dispatcher(&sink), vec![wire])
        .await
        .expect("drive session");

    assert_eq!(outcome.result.expect("clean").files_completed, 1);
    assert_eq!(sink.files()[0].payload().as_ref(), b"ABC");
}

#[tokio::test]
async fn empty_filename_and_payload_are_valid() {
    let sink = RecordingSink::default();
    let wire = encode_frames(&[frame("", DataType::Csv, 0, true, b"")]);

    let outcome = drive_session(SessionConfig::default(), dispatcher(&sink), vec![wire])
        .await
        .expect("drive session");

    assert_eq!(
        outcome.acks(),
        "File '' received and processed successfully."
    );
    assert!(sink.files()[0].payload().is_empty());
}

#[tokio::test]
async fn unknown_then_known_type_binds_store_to_known_type() {
    let sink = RecordingSink::default();
    let wire = encode_frames(&[
        frame("u", DataType::Unknown(9), 0, false, b"dropped"),
        frame("u", DataType::Jpeg, 0, true, b"kept"),
    ]);

    let outcome = drive_session(SessionConfig::default(), dispatcher(&sink), vec![wire])
        .await
        .expect("drive session");

    let summary = outcome.result.expect("clean");
    assert_eq!(summary.rejected, 1);
    let files = sink.files();
    assert_eq!(files[0].data_type(), DataType::Jpeg);
    assert_eq!(files[0].payload().as_ref(), b"kept");
}

#[rstest]
#[case(UnknownTypePolicy::Drop, 0)]
#[case(UnknownTypePolicy::Reject, 0)]
#[case(UnknownTypePolicy::Opaque, 1)]
#[tokio::test]
async fn unknown_type_policy_controls_dispatch(
    #[case] unknown_type_policy: UnknownTypePolicy,
    #[case] dispatched: usize,
) {
    let sink = RecordingSink::default();
    let wire = encode_frames(&[frame("x", DataType::Unknown(0xee), 0, true, b"?")]);
    let config = SessionConfig {
        unknown_type_policy,
        ..SessionConfig::default()
    };

    drive_session(config, dispatcher(&sink), vec![wire])
        .await
        .expect("drive session");

    assert_eq!(sink.len(), dispatched);
}

#[tokio::test]
async fn invalid_filename_after_complete_file_is_fatal() {
    let sink = RecordingSink::default();
    let mut wire = encode_frames(&[frame("first", DataType::Bin, 0, true, b"1")]);
    wire.extend_from_slice(&[2, 0xe2, 0x28, 2, 0, 0, 0, 1, 0, 0, 0, 0, 1, b'z']);
    wire.extend_from_slice(&encode_frames(&[frame("never", DataType::Bin, 0, true, b"2")]));

    let outcome = drive_session(SessionConfig::default(), dispatcher(&sink), vec![wire])
        .await
        .expect("drive session");

    assert!(matches!(
        outcome.result,
        Err(SessionError::Codec(CodecError::Framing(
            FramingError::InvalidFilename { len: 2, .. }
        )))
    ));
    assert_eq!(sink.filenames(), ["first"]);
}
