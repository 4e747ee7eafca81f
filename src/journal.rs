//! Frame journal
//!
//! Plain-text record of received frames and notable events, one line each:
//! `[YYYY-MM-DD HH:MM:SS] PREFIX: text`. Write failures are logged and
//! otherwise ignored so the journal can never interrupt dispatch.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Local;

use crate::Result;

/// Appends timestamped lines to `websocket_log_<YYYYMMDD_HHMMSS>.txt`
#[derive(Debug)]
pub struct FrameJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FrameJournal {
    /// Create a new journal file in `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!("websocket_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!(path = %path.display(), "frame journal opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Journal file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn record(&self, prefix: &str, text: &str) {
        let line = format!(
            "[{}] {prefix}: {text}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
            tracing::warn!(error = %e, "failed to write frame journal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_timestamp_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FrameJournal::create(dir.path()).unwrap();
        journal.record("RECV", "2");
        journal.record("SEND", "3");

        let name = journal.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("websocket_log_"));
        assert!(name.ends_with(".txt"));

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] RECV: 2"));
        assert!(lines[1].ends_with("] SEND: 3"));
    }
}
