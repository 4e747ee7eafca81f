//! Streaming client orchestration
//!
//! - `sender`: capture, encode and send loop for the ASR channel
//! - `receiver`: navigation event dispatch, speech fetch and playback
//!
//! Both loops drive the connection through [`StreamLink`] and never exit on
//! error: every failure is logged and the loop continues after a fixed delay.

mod receiver;
mod sender;

use async_trait::async_trait;

pub use receiver::{NavigationListener, attach_listener, dispatch_frame, speak_once};
pub use sender::{AudioStreamer, CycleOutcome, attach_streamer, clip_file_name};

use crate::Result;
use crate::connection::ConnectionManager;
use crate::protocol::Envelope;

/// Connection operations the orchestration loops depend on
#[async_trait]
pub trait StreamLink: Send {
    /// Whether the connection is open
    fn is_open(&self) -> bool;

    /// Connect and wait a bounded time for the connection to open
    async fn connect(&mut self, url: &str) -> bool;

    /// Send one envelope
    ///
    /// # Errors
    ///
    /// Returns error if the connection is not open or the write fails
    async fn send(&mut self, envelope: &Envelope) -> Result<()>;

    /// Drop the connection so the next cycle reconnects
    async fn disconnect(&mut self);
}

#[async_trait]
impl StreamLink for ConnectionManager {
    fn is_open(&self) -> bool {
        Self::is_open(self)
    }

    async fn connect(&mut self, url: &str) -> bool {
        Self::connect(self, url).await
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        Self::send(self, envelope).await
    }

    async fn disconnect(&mut self) {
        self.close().await;
    }
}

/// Sleep for `delay` unless `shutdown` fires first
///
/// Returns `false` if shutdown was requested.
async fn pause(delay: std::time::Duration, shutdown: &tokio_util::sync::CancellationToken) -> bool {
    if delay.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = shutdown.cancelled() => false,
    }
}
