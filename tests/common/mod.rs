//! Shared test utilities

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use edgevoice::config::ConnectionConfig;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What the test server saw from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Text(String),
    Close(Option<u16>),
}

/// Plain `ws://` server on loopback
pub struct TestServer {
    pub addr: SocketAddr,
    pub seen: mpsc::UnboundedReceiver<Seen>,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    /// Base URL of the server
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket handshakes completed so far
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next thing the server saw, waiting up to two seconds
    pub async fn next_seen(&mut self) -> Seen {
        tokio::time::timeout(Duration::from_secs(2), self.seen.recv())
            .await
            .expect("timed out waiting for client traffic")
            .expect("server task ended")
    }

    /// Next text frame, skipping nothing
    pub async fn next_text(&mut self) -> String {
        match self.next_seen().await {
            Seen::Text(text) => text,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Start a server that sends `greeting` to every client, then records what
/// the client sends. With `close_after_greeting` it closes the connection
/// itself right after the greeting.
pub async fn spawn_server(greeting: &[&str], close_after_greeting: bool) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");
    let (tx, seen) = mpsc::unbounded_channel();
    let accepted = Arc::new(AtomicUsize::new(0));
    let greeting: Vec<String> = greeting.iter().map(ToString::to_string).collect();

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            let greeting = greeting.clone();
            let counter = Arc::clone(&counter);

            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);

                for frame in greeting {
                    if ws.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                if close_after_greeting {
                    let _ = ws.close(None).await;
                }

                // Keep reading after a close so the reply gets flushed
                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(text) => {
                            let _ = tx.send(Seen::Text(text));
                        }
                        Message::Close(frame) => {
                            let _ = tx.send(Seen::Close(frame.map(|f| u16::from(f.code))));
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    TestServer {
        addr,
        seen,
        accepted,
    }
}

/// Connection settings tuned for loopback tests
#[must_use]
pub fn fast_connection() -> ConnectionConfig {
    ConnectionConfig {
        poll_interval: Duration::from_millis(50),
        poll_attempts: 40,
        handshake_timeout: Duration::from_secs(2),
        send_timeout: Duration::from_secs(2),
        close_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_millis(100),
        error_delay: Duration::from_millis(50),
        ..ConnectionConfig::default()
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..40 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

/// Start a server that completes the handshake and then never reads, so the
/// client's socket buffers eventually fill and writes stall
pub async fn spawn_stalled_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(ws);
            });
        }
    });

    addr
}
