//! Voice I/O
//!
//! Capture and playback shell out to ALSA/PulseAudio utilities under a
//! supervised runner; speech synthesis is fetched over HTTP.

mod capture;
mod playback;
mod process;
mod tts;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use capture::AudioCapture;
pub use playback::AudioPlayback;
pub use process::run_supervised;
pub use tts::{HttpSpeechFetcher, SpeechFetcher};

use crate::Result;
use crate::config::{CaptureConfig, PlaybackConfig};

/// Local audio capture and playback
#[async_trait]
pub trait AudioIo: Send + Sync {
    /// Record one clip to `dest`
    ///
    /// # Errors
    ///
    /// Returns error if recording fails, times out, or is cancelled
    async fn capture(&self, dest: &Path, cancel: &CancellationToken) -> Result<()>;

    /// Play raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if playback fails, times out, or is cancelled
    async fn playback(&self, audio: &[u8], cancel: &CancellationToken) -> Result<()>;
}

/// `AudioIo` backed by external command-line utilities
#[derive(Debug, Clone)]
pub struct CommandAudioIo {
    capture: AudioCapture,
    playback: AudioPlayback,
}

impl CommandAudioIo {
    #[must_use]
    pub const fn new(capture: CaptureConfig, playback: PlaybackConfig) -> Self {
        Self {
            capture: AudioCapture::new(capture),
            playback: AudioPlayback::new(playback),
        }
    }
}

#[async_trait]
impl AudioIo for CommandAudioIo {
    async fn capture(&self, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        self.capture.record(dest, cancel).await
    }

    async fn playback(&self, audio: &[u8], cancel: &CancellationToken) -> Result<()> {
        self.playback.play(audio, cancel).await
    }
}
