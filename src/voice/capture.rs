//! Audio capture through `arecord`

use std::path::Path;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::process::run_supervised;
use crate::Result;
use crate::config::CaptureConfig;

/// Records fixed-length clips with an ALSA capture utility
#[derive(Debug, Clone)]
pub struct AudioCapture {
    config: CaptureConfig,
}

impl AudioCapture {
    #[must_use]
    pub const fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Settings this capture runs with
    #[must_use]
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Record one clip to `dest`
    ///
    /// # Errors
    ///
    /// Returns error if the utility fails, times out, or is cancelled
    pub async fn record(&self, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        tracing::debug!(
            device = %self.config.device,
            file = %dest.display(),
            "recording clip"
        );
        run_supervised(self.command(dest), self.config.timeout, cancel).await
    }

    fn command(&self, dest: &Path) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .arg("-D")
            .arg(&self.config.device)
            .arg("-d")
            .arg(self.config.clip_duration.as_secs().max(1).to_string())
            .arg("-f")
            .arg(&self.config.format)
            .arg("-r")
            .arg(self.config.sample_rate.to_string())
            .arg(dest);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_matches_arecord_usage() {
        let capture = AudioCapture::new(CaptureConfig::default());
        let command = capture.command(Path::new("rec_20250101_120000.wav"));
        let inner = command.as_std();

        assert_eq!(inner.get_program(), "arecord");
        let args: Vec<_> = inner.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-D",
                "hw:5,0",
                "-d",
                "2",
                "-f",
                "S16_LE",
                "-r",
                "16000",
                "rec_20250101_120000.wav"
            ]
        );
    }
}
