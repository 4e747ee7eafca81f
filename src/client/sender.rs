//! Sender loop: capture a clip, wrap it in an audio envelope, send it

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use super::{StreamLink, pause};
use crate::config::{CaptureConfig, ConnectionConfig};
use crate::connection::ConnectionManager;
use crate::identity::ClientIdentity;
use crate::protocol::{ServerEvent, encode_audio, encode_config};
use crate::voice::AudioIo;
use crate::Result;

/// Result of one capture/send cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Clip delivered to the transport
    Sent { bytes: usize },
    /// Connection did not open in time
    ConnectFailed,
    /// Capture utility failed or left no artifact
    CaptureFailed,
    /// Artifact could not be read
    ReadFailed,
    /// Transport rejected the envelope; the clip stays on disk
    SendFailed,
}

/// Capture artifact name for a given moment
#[must_use]
pub fn clip_file_name(at: DateTime<Local>) -> String {
    format!("rec_{}.wav", at.format("%Y%m%d_%H%M%S"))
}

/// Register the sender's callbacks on a connection
///
/// Every time the connection opens, the config envelope is written before
/// any audio. Frames from the service are decoded and logged.
///
/// # Errors
///
/// Returns error if the capture settings do not form a valid config
/// envelope
pub fn attach_streamer(manager: &ConnectionManager, capture: &CaptureConfig) -> Result<()> {
    let frame = encode_config(
        &capture.audio_format,
        capture.sample_rate,
        capture.channels,
        capture.chunk_size,
    )?
    .to_frame()?;

    manager.on_open(move |outbox| {
        tracing::info!("connection open, sending audio config");
        outbox.push(frame.clone());
    });
    manager.on_message(|text, _| log_server_event(text));
    manager.on_close(|| tracing::info!("streaming connection closed"));
    manager.on_fail(|reason| tracing::warn!(reason, "streaming connection failed"));
    Ok(())
}

/// Streams captured clips to the ASR service
pub struct AudioStreamer<L, A> {
    link: L,
    audio: A,
    identity: ClientIdentity,
    url: String,
    spool_dir: PathBuf,
    reconnect_delay: Duration,
    error_delay: Duration,
}

impl<L: StreamLink, A: AudioIo> AudioStreamer<L, A> {
    #[must_use]
    pub fn new(
        link: L,
        audio: A,
        identity: ClientIdentity,
        url: String,
        capture: &CaptureConfig,
        connection: &ConnectionConfig,
    ) -> Self {
        Self {
            link,
            audio,
            identity,
            url,
            spool_dir: capture.spool_dir.clone(),
            reconnect_delay: connection.reconnect_delay,
            error_delay: connection.error_delay,
        }
    }

    /// Run cycles until `shutdown` fires, then disconnect
    pub async fn run(&mut self, shutdown: &CancellationToken) {
        tracing::info!(url = %self.url, client = %self.identity, "audio streamer started");

        while !shutdown.is_cancelled() {
            let outcome = self.run_cycle(shutdown).await;
            if !pause(self.delay_after(outcome), shutdown).await {
                break;
            }
        }

        self.link.disconnect().await;
        tracing::info!("audio streamer stopped");
    }

    /// Delay before the next cycle
    #[must_use]
    pub const fn delay_after(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::ConnectFailed => self.reconnect_delay,
            CycleOutcome::CaptureFailed | CycleOutcome::ReadFailed => self.error_delay,
            CycleOutcome::Sent { .. } | CycleOutcome::SendFailed => Duration::ZERO,
        }
    }

    /// One pass: make sure the link is open, capture, send
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        if !self.link.is_open() {
            tracing::info!(url = %self.url, "connecting");
            if !self.link.connect(&self.url).await {
                tracing::warn!(delay = ?self.reconnect_delay, "connect failed, retrying later");
                return CycleOutcome::ConnectFailed;
            }
        }

        let path = self.spool_dir.join(clip_file_name(Local::now()));
        if let Err(e) = self.audio.capture(&path, cancel).await {
            tracing::warn!(kind = ?e.kind(), error = %e, "capture failed");
            return CycleOutcome::CaptureFailed;
        }
        if !path.exists() {
            tracing::warn!(file = %path.display(), "capture produced no file");
            return CycleOutcome::CaptureFailed;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "failed to read clip");
                return CycleOutcome::ReadFailed;
            }
        };

        let envelope = encode_audio(&bytes, &self.identity);
        if let Err(e) = self.link.send(&envelope).await {
            tracing::warn!(
                kind = ?e.kind(),
                error = %e,
                file = %path.display(),
                "send failed, keeping clip and dropping connection"
            );
            self.link.disconnect().await;
            return CycleOutcome::SendFailed;
        }

        tracing::info!(bytes = bytes.len(), file = %path.display(), "clip sent");
        remove_clip(&path).await;
        CycleOutcome::Sent { bytes: bytes.len() }
    }

    /// The underlying link
    pub const fn link(&self) -> &L {
        &self.link
    }
}

async fn remove_clip(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(file = %path.display(), error = %e, "failed to remove sent clip");
    }
}

fn log_server_event(text: &str) {
    match ServerEvent::parse(text) {
        Some(ServerEvent::Connected { message, .. }) => {
            tracing::info!(detail = message.as_deref().unwrap_or(""), "server accepted session");
        }
        Some(ServerEvent::Transcription { event_type, text }) => match event_type.as_str() {
            "completed" => tracing::info!(text = %text, "transcription"),
            "delta" => tracing::debug!(text = %text, "partial transcription"),
            "error" => tracing::warn!(text = %text, "transcription error"),
            other => tracing::debug!(event = other, "transcription event"),
        },
        Some(ServerEvent::Pong) => tracing::trace!("pong"),
        Some(ServerEvent::Error { message }) => {
            tracing::warn!(detail = message.as_deref().unwrap_or(""), "server error");
        }
        Some(ServerEvent::ConfigAck { .. }) => tracing::debug!("config acknowledged"),
        Some(ServerEvent::Other) => tracing::debug!(frame = text, "unhandled server event"),
        None => tracing::debug!(frame = text, "ignoring malformed server frame"),
    }
}
