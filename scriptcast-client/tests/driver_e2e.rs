//! Driver tests against a scripted fake server on localhost TCP:
//! exact upload frame shapes, outcome mapping, and rendering.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use scriptcast_client::driver::{ClientOptions, Driver};
use scriptcast_core::{CastError, Connection, Frame, FrameKind, MAX_BLOCK_SIZE};

// ── Harness ──────────────────────────────────────────────────────

/// Accept one connection and run `behavior` against it, returning
/// the frames received during the upload phase.
fn fake_server(behavior: ServerBehavior) -> (String, JoinHandle<Vec<Frame>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = tokio::spawn(async move {
        let listener = TcpListener::from_std(listener).unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);

        let mut upload = Vec::new();
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), conn.recv())
                .await
                .expect("timed out waiting for upload frames")
                .expect("client closed mid-upload");
            let done = frame.is_end_of_sequence();
            upload.push(frame);
            if done {
                break;
            }
        }

        match behavior {
            ServerBehavior::Succeed { output } => {
                for text in output {
                    conn.send(Frame::new(FrameKind::ScreenText, text.into_bytes()))
                        .await
                        .unwrap();
                }
                conn.send(Frame::new(FrameKind::ScreenText, Vec::new()).end_of_sequence())
                    .await
                    .unwrap();
                // Give the client time to drain before the socket drops.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            ServerBehavior::FailSilently => {
                // Close without the end marker.
            }
        }
        upload
    });

    (addr, handle)
}

enum ServerBehavior {
    Succeed { output: Vec<String> },
    FailSilently,
}

// ── Upload shapes ────────────────────────────────────────────────

#[tokio::test]
async fn local_upload_produces_exact_chunk_sequence() {
    // 2.5 blocks → 3 chunks, last trimmed and flagged.
    let body: Vec<u8> = (0..MAX_BLOCK_SIZE * 2 + MAX_BLOCK_SIZE / 2)
        .map(|i| (i % 251) as u8)
        .collect();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.lua");
    std::fs::write(&path, &body).unwrap();

    let (addr, server) = fake_server(ServerBehavior::Succeed { output: vec![] });
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: path.to_str().unwrap().to_string(),
        args: None,
    });
    let mut rendered = Vec::new();
    let mut status = Vec::new();
    driver.run(&mut rendered, &mut status).await.unwrap();

    let upload = server.await.unwrap();
    assert_eq!(upload[0].kind(), FrameKind::FileReference);
    assert_eq!(upload[0].payload(), b"blob.lua");
    assert!(!upload[0].is_archive());
    assert!(!upload[0].is_end_of_sequence());

    let chunks = &upload[1..];
    assert_eq!(chunks.len(), 3, "ceil(M/k) chunks");
    for chunk in chunks {
        assert_eq!(chunk.kind(), FrameKind::ExecutableChunk);
        assert!(chunk.payload_len() <= MAX_BLOCK_SIZE);
    }
    assert!(chunks.iter().rev().skip(1).all(|c| !c.is_end_of_sequence()));
    assert!(chunks.last().unwrap().is_end_of_sequence());
    assert_eq!(
        chunks.last().unwrap().payload_len(),
        MAX_BLOCK_SIZE / 2,
        "final chunk trimmed to its true length"
    );

    let reassembled: Vec<u8> = chunks.iter().flat_map(|c| c.payload().to_vec()).collect();
    assert_eq!(reassembled, body, "server receives the file byte-identical");

    // Progress was reported along the way.
    let status_text = String::from_utf8(status).unwrap();
    assert!(status_text.contains("chunks"));
}

#[tokio::test]
async fn shared_reference_without_args_is_one_frame() {
    let (addr, server) = fake_server(ServerBehavior::Succeed { output: vec![] });
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: "shared:game.lua".into(),
        args: None,
    });
    driver.run(&mut Vec::new(), &mut Vec::new()).await.unwrap();

    let upload = server.await.unwrap();
    assert_eq!(upload.len(), 1, "the upload phase is exactly one frame");
    assert_eq!(upload[0].kind(), FrameKind::FileReference);
    assert_eq!(upload[0].payload(), b"shared:game.lua");
    assert!(upload[0].is_end_of_sequence());
}

#[tokio::test]
async fn shared_reference_with_args_ends_on_the_argument_frame() {
    let (addr, server) = fake_server(ServerBehavior::Succeed { output: vec![] });
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: "shared:game.lua".into(),
        args: Some("--speed 2".into()),
    });
    driver.run(&mut Vec::new(), &mut Vec::new()).await.unwrap();

    let upload = server.await.unwrap();
    assert_eq!(upload.len(), 2);
    assert!(!upload[0].is_end_of_sequence());
    assert_eq!(upload[1].kind(), FrameKind::Arguments);
    assert_eq!(upload[1].payload(), b"--speed 2");
    assert!(upload[1].is_end_of_sequence());
}

#[tokio::test]
async fn archive_extension_sets_the_archive_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pack.zip");
    std::fs::write(&path, b"PK\x03\x04fake").unwrap();

    let (addr, server) = fake_server(ServerBehavior::Succeed { output: vec![] });
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: path.to_str().unwrap().to_string(),
        args: None,
    });
    driver.run(&mut Vec::new(), &mut Vec::new()).await.unwrap();

    let upload = server.await.unwrap();
    assert_eq!(upload[0].payload(), b"pack.zip");
    assert!(upload[0].is_archive());
}

// ── Outcomes ─────────────────────────────────────────────────────

#[tokio::test]
async fn server_output_is_rendered_before_the_end_marker() {
    let (addr, server) = fake_server(ServerBehavior::Succeed {
        output: vec!["hello from the server\n".into()],
    });
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: "shared:hello.lua".into(),
        args: None,
    });

    let mut rendered = Vec::new();
    driver.run(&mut rendered, &mut Vec::new()).await.unwrap();
    server.await.unwrap();
    assert_eq!(rendered, b"hello from the server\n");
}

#[tokio::test]
async fn close_without_end_marker_is_a_failure() {
    let (addr, server) = fake_server(ServerBehavior::FailSilently);
    let driver = Driver::new(ClientOptions {
        server: addr,
        target: "shared:broken.lua".into(),
        args: None,
    });

    let err = driver
        .run(&mut Vec::new(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CastError::ConnectionClosed));
    server.await.unwrap();
}

#[tokio::test]
async fn missing_local_file_aborts_before_connecting() {
    // No server exists at this address; a file-open failure must
    // surface before any dial attempt.
    let driver = Driver::new(ClientOptions {
        server: "127.0.0.1:9".into(),
        target: "/definitely/not/here.lua".into(),
        args: None,
    });

    let err = driver
        .run(&mut Vec::new(), &mut Vec::new())
        .await
        .unwrap_err();
    match err {
        CastError::Connection(io) => {
            assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected a file-open error, got {other}"),
    }
}
