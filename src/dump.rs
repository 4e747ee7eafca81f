//! Binary frame dump server
//!
//! Accepts WebSocket connections on any path and writes every binary frame,
//! verbatim, to `<output_dir>/rec_YYYYMMDD_HHMMSS.wav`. Text frames are
//! ignored. Useful as a stand-in endpoint when testing capture pipelines.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use chrono::Local;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::Result;

/// Default listening port
pub const DEFAULT_PORT: u16 = 9002;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "output_test";

/// Write `frame` to a new timestamped file in `dir`
///
/// Frames landing in the same second get a `_1`, `_2`, ... suffix, so no
/// frame overwrites another.
///
/// # Errors
///
/// Returns error if the file cannot be created or written
pub async fn save_frame(dir: &Path, frame: &[u8]) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("rec_{stamp}.wav")
        } else {
            format!("rec_{stamp}_{attempt}.wav")
        };
        let path = dir.join(name);

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(frame).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

struct DumpState {
    output_dir: PathBuf,
}

/// WebSocket sink that stores binary frames on disk
pub struct DumpServer {
    port: u16,
    output_dir: PathBuf,
}

impl DumpServer {
    #[must_use]
    pub const fn new(port: u16, output_dir: PathBuf) -> Self {
        Self { port, output_dir }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::new(DumpState {
            output_dir: self.output_dir.clone(),
        });

        Router::new()
            .route("/", get(ws_handler))
            .route("/{*path}", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured port and serve until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns error if the output directory cannot be created or the server
    /// fails to bind or run
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind dump server: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns error if the output directory cannot be created or the server
    /// fails
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        tracing::info!(
            addr = %listener.local_addr()?,
            dir = %self.output_dir.display(),
            "dump server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("dump server stopped");
        Ok(())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<DumpState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<DumpState>) {
    tracing::info!("dump client connected");

    while let Some(Ok(msg)) = socket.next().await {
        match msg {
            Message::Binary(frame) => match save_frame(&state.output_dir, &frame).await {
                Ok(path) => {
                    tracing::info!(bytes = frame.len(), file = %path.display(), "frame saved");
                }
                Err(e) => tracing::error!(error = %e, "failed to save frame"),
            },
            Message::Text(_) => tracing::debug!("ignoring text frame"),
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!("dump client disconnected");
}
