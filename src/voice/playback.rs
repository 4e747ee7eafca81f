//! Audio playback through `aplay` or `paplay`

use std::io::Write;
use std::path::Path;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::process::run_supervised;
use crate::Result;
use crate::config::{PlaybackConfig, Player};

/// Plays audio bytes with a local playback utility
#[derive(Debug, Clone)]
pub struct AudioPlayback {
    config: PlaybackConfig,
}

impl AudioPlayback {
    #[must_use]
    pub const fn new(config: PlaybackConfig) -> Self {
        Self { config }
    }

    /// Play `audio`
    ///
    /// The bytes go to a `tts_*.wav` temporary file, which is removed
    /// whether or not playback succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the temporary file cannot be written, or the utility
    /// fails, times out, or is cancelled
    pub async fn play(&self, audio: &[u8], cancel: &CancellationToken) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("tts_")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(audio)?;
        file.flush()?;

        tracing::debug!(
            player = self.config.player.program(),
            bytes = audio.len(),
            file = %file.path().display(),
            "playing audio"
        );

        let result = run_supervised(self.command(file.path()), self.config.timeout, cancel).await;

        if let Err(e) = file.close() {
            tracing::warn!(error = %e, "failed to remove playback file");
        }
        result
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(self.config.player.program());
        if self.config.player == Player::Aplay {
            command.arg("-D").arg(&self.config.device);
        }
        command.arg(path);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn aplay_selects_device() {
        let playback = AudioPlayback::new(PlaybackConfig::default());
        let command = playback.command(Path::new("/tmp/tts_x.wav"));
        assert_eq!(command.as_std().get_program(), "aplay");
        assert_eq!(args(&command), ["-D", "plughw:6,0", "/tmp/tts_x.wav"]);
    }

    #[test]
    fn paplay_takes_only_the_file() {
        let playback = AudioPlayback::new(PlaybackConfig {
            player: Player::Paplay,
            ..PlaybackConfig::default()
        });
        let command = playback.command(Path::new("/tmp/tts_x.wav"));
        assert_eq!(command.as_std().get_program(), "paplay");
        assert_eq!(args(&command), ["/tmp/tts_x.wav"]);
    }
}
