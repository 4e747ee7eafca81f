//! Dump server writes binary frames verbatim

mod common;

use std::path::Path;
use std::time::Duration;

use common::eventually;
use edgevoice::dump::DumpServer;
use futures::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn binary_frame_is_stored_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output_test");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(
        DumpServer::new(0, output.clone()).serve(listener, shutdown.clone()),
    );

    let (mut ws, _) = connect_async(format!("ws://{addr}/stream")).await.unwrap();
    let frame: Vec<u8> = (0..=255u8).cycle().take(32_000).collect();
    ws.send(Message::Text("ignored".to_string())).await.unwrap();
    ws.send(Message::Binary(frame.clone())).await.unwrap();

    // The file exists before its bytes are written
    let expected_len = u64::try_from(frame.len()).unwrap();
    let fully_written = || {
        let files = files_in(&output);
        files.len() == 1
            && std::fs::metadata(&files[0]).is_ok_and(|meta| meta.len() == expected_len)
    };
    assert!(eventually(fully_written).await);
    let files = files_in(&output);
    let stored = std::fs::read(&files[0]).unwrap();
    assert_eq!(stored, frame);

    let _ = ws.close(None).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
