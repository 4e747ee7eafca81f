//! Supervised execution of external audio utilities

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Run `command` to completion under a deadline and a cancellation signal
///
/// The child is killed if the deadline passes or `cancel` fires first.
/// Stdout is discarded; stderr is captured and logged.
///
/// # Errors
///
/// Returns `Timeout`, `Cancelled`, or `Process` for a spawn failure or a
/// non-zero exit
pub async fn run_supervised(
    mut command: Command,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| Error::Process(format!("failed to spawn {program}: {e}")))?;

    let output = tokio::select! {
        output = tokio::time::timeout(limit, child.wait_with_output()) => {
            output.map_err(|_| {
                tracing::warn!(program = %program, timeout = ?limit, "utility timed out, killed");
                Error::Timeout(limit)
            })??
        }
        () = cancel.cancelled() => {
            tracing::debug!(program = %program, "utility cancelled, killed");
            return Err(Error::Cancelled);
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        tracing::debug!(program = %program, stderr = %stderr, "utility stderr");
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        return Err(Error::Process(format!("{program} exited with code {code}")));
    }

    Ok(())
}
