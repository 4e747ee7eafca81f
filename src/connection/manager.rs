//! Connection manager
//!
//! Owns at most one WebSocket connection at a time. The socket itself lives on
//! a dedicated transport thread; the manager talks to it through a command
//! channel and reads the lifecycle from a shared atomic state value.

use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use super::state::{ConnectionState, SharedState};
use super::transport::{Command, EventLoop, Outbox, SharedHandlers, TransportSettings};
use crate::config::ConnectionConfig;
use crate::protocol::Envelope;
use crate::{Error, Result};

/// Handle to the running transport thread
struct Worker {
    commands: mpsc::UnboundedSender<Command>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn is_running(&self) -> bool {
        !self.thread.is_finished() && !self.commands.is_closed()
    }
}

/// Manages the lifecycle of one streaming connection
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: SharedState,
    handlers: SharedHandlers,
    worker: Option<Worker>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            config: config.clone(),
            state: SharedState::new(),
            handlers: Arc::default(),
            worker: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Shared handle to the lifecycle state
    #[must_use]
    pub fn state_handle(&self) -> SharedState {
        self.state.clone()
    }

    /// Whether the connection is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Called on the transport thread once the connection is open
    ///
    /// Frames pushed to the outbox are written before any other traffic.
    pub fn on_open(&self, callback: impl Fn(&mut Outbox) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .open = Some(Box::new(callback));
    }

    /// Called on the transport thread for every text frame
    pub fn on_message(&self, callback: impl Fn(&str, &mut Outbox) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .message = Some(Box::new(callback));
    }

    /// Called on the transport thread when the connection closes
    pub fn on_close(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .close = Some(Box::new(callback));
    }

    /// Called on the transport thread when connecting fails or the
    /// connection breaks
    pub fn on_fail(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = Some(Box::new(callback));
    }

    /// Connect to `url` and wait a bounded time for the connection to open
    ///
    /// Polls the state `poll_attempts` times, `poll_interval` apart. Returns
    /// `true` as soon as the state is `Open`, `false` once the polls run out.
    /// A connection that is already open returns `true` immediately. While a
    /// handshake is still in flight no second one is started.
    pub async fn connect(&mut self, url: &str) -> bool {
        if self.is_open() {
            return true;
        }

        if let Err(e) = self.dispatch_connect(url) {
            tracing::error!(error = %e, "failed to start transport");
            self.state.transition(ConnectionState::Failed);
            return false;
        }

        for _ in 0..self.config.poll_attempts {
            tokio::time::sleep(self.config.poll_interval).await;
            if self.is_open() {
                return true;
            }
        }

        tracing::warn!(
            url,
            state = %self.state(),
            attempts = self.config.poll_attempts,
            "connection did not open in time"
        );
        false
    }

    fn dispatch_connect(&mut self, url: &str) -> Result<()> {
        let handshake_in_flight = self.state() == ConnectionState::Connecting;

        let worker = match self.worker.take() {
            Some(worker) if worker.is_running() => worker,
            stale => {
                if stale.is_some() {
                    tracing::debug!("replacing stopped transport thread");
                }
                self.spawn_worker()?
            }
        };

        if handshake_in_flight && self.state() == ConnectionState::Connecting {
            self.worker = Some(worker);
            return Ok(());
        }

        self.state.transition(ConnectionState::Connecting);
        let sent = worker.commands.send(Command::Connect {
            url: url.to_string(),
        });
        self.worker = Some(worker);
        sent.map_err(|_| Error::Transport("transport thread is gone".to_string()))
    }

    fn spawn_worker(&mut self) -> Result<Worker> {
        // A worker that died mid-handshake leaves the state at Connecting
        if self.state() == ConnectionState::Connecting {
            self.state.transition(ConnectionState::Failed);
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop::new(
            rx,
            self.state.clone(),
            Arc::clone(&self.handlers),
            TransportSettings::from(&self.config),
        );
        let thread = event_loop.spawn()?;
        tracing::debug!("transport thread started");
        Ok(Worker { commands, thread })
    }

    /// Serialize and send an envelope
    ///
    /// # Errors
    ///
    /// Returns error immediately if the connection is not open, or if the
    /// write fails or is not acknowledged within the send timeout
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_open() {
            return Err(Error::Transport(format!(
                "cannot send {} envelope: connection is {}",
                envelope.kind(),
                self.state()
            )));
        }
        self.send_text(envelope.to_frame()?).await
    }

    /// Send a raw text frame
    ///
    /// # Errors
    ///
    /// Returns error immediately if the connection is not open, or if the
    /// write fails or is not acknowledged within the send timeout
    pub async fn send_text(&self, frame: String) -> Result<()> {
        let worker = match &self.worker {
            Some(worker) if self.is_open() => worker,
            _ => {
                return Err(Error::Transport(format!(
                    "connection is {}",
                    self.state()
                )));
            }
        };

        let (ack, acked) = oneshot::channel();
        worker
            .commands
            .send(Command::Send { frame, ack })
            .map_err(|_| Error::Transport("transport thread is gone".to_string()))?;

        match tokio::time::timeout(self.config.send_timeout, acked).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Transport(
                "transport dropped the send request".to_string(),
            )),
            Err(_) => Err(Error::SendTimeout(self.config.send_timeout)),
        }
    }

    /// Close the connection and stop the transport thread
    ///
    /// Sends a normal-closure frame if the connection is open, then joins
    /// the transport thread. Always ends in `Disconnected`.
    pub async fn close(&mut self) {
        self.state.transition(ConnectionState::Closing);

        if let Some(worker) = self.worker.take() {
            let (done, closed) = oneshot::channel();
            if worker.commands.send(Command::Close { done }).is_ok() {
                let wait = self.config.close_timeout + self.config.poll_interval;
                if tokio::time::timeout(wait, closed).await.is_err() {
                    tracing::debug!("transport did not confirm close in time");
                }
            }

            let _ = worker.commands.send(Command::Shutdown);
            match tokio::task::spawn_blocking(move || worker.thread.join()).await {
                Ok(Ok(())) => tracing::debug!("transport thread joined"),
                Ok(Err(_)) => tracing::error!("transport thread panicked"),
                Err(e) => tracing::error!(error = %e, "failed to join transport thread"),
            }
        }

        self.state.transition(ConnectionState::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.commands.send(Command::Shutdown);
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("worker", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}
