//! Transport event loop
//!
//! Runs on a dedicated OS thread with its own current-thread tokio runtime.
//! Callbacks registered on the manager are invoked here, one at a time, and
//! must stay short: anything slow belongs on the orchestration thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};

use super::state::{ConnectionState, SharedState};
use super::tls;
use crate::config::ConnectionConfig;
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

type OpenHandler = Box<dyn Fn(&mut Outbox) + Send + Sync>;
type MessageHandler = Box<dyn Fn(&str, &mut Outbox) + Send + Sync>;
type CloseHandler = Box<dyn Fn() + Send + Sync>;
type FailHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Frames queued by a callback, written as soon as the callback returns
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<String>,
}

impl Outbox {
    /// Queue a text frame
    pub fn push(&mut self, frame: impl Into<String>) {
        self.frames.push(frame.into());
    }

    /// Frames queued so far
    #[must_use]
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.frames)
    }
}

/// Callbacks invoked on the transport thread
#[derive(Default)]
pub(crate) struct Handlers {
    pub(crate) open: Option<OpenHandler>,
    pub(crate) message: Option<MessageHandler>,
    pub(crate) close: Option<CloseHandler>,
    pub(crate) fail: Option<FailHandler>,
}

pub(crate) type SharedHandlers = Arc<RwLock<Handlers>>;

/// Run a callback, containing any panic so the event loop survives it
fn guarded(name: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::error!(callback = name, "connection callback panicked");
    }
}

fn fire_open(handlers: &SharedHandlers, outbox: &mut Outbox) {
    let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(open) = &handlers.open {
        guarded("open", || open(outbox));
    }
}

fn fire_message(handlers: &SharedHandlers, text: &str, outbox: &mut Outbox) {
    let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(message) = &handlers.message {
        guarded("message", || message(text, outbox));
    }
}

fn fire_close(handlers: &SharedHandlers) {
    let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(close) = &handlers.close {
        guarded("close", close);
    }
}

fn fire_fail(handlers: &SharedHandlers, reason: &str) {
    let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(fail) = &handlers.fail {
        guarded("fail", || fail(reason));
    }
}

/// Requests from the manager to the transport thread
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        url: String,
    },
    Send {
        frame: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
    Shutdown,
}

/// What the loop does after a connection ends
enum Flow {
    Continue,
    Shutdown,
}

/// Settings the transport thread needs
#[derive(Debug, Clone)]
pub(crate) struct TransportSettings {
    accept_invalid_certs: bool,
    handshake_timeout: Duration,
    send_timeout: Duration,
    close_timeout: Duration,
    headers: Vec<(String, String)>,
}

impl From<&ConnectionConfig> for TransportSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            accept_invalid_certs: config.accept_invalid_certs,
            handshake_timeout: config.handshake_timeout,
            send_timeout: config.send_timeout,
            close_timeout: config.close_timeout,
            headers: config.headers.clone(),
        }
    }
}

/// Event loop owning at most one live WebSocket
pub(crate) struct EventLoop {
    commands: mpsc::UnboundedReceiver<Command>,
    state: SharedState,
    handlers: SharedHandlers,
    settings: TransportSettings,
}

impl EventLoop {
    pub(crate) const fn new(
        commands: mpsc::UnboundedReceiver<Command>,
        state: SharedState,
        handlers: SharedHandlers,
        settings: TransportSettings,
    ) -> Self {
        Self {
            commands,
            state,
            handlers,
            settings,
        }
    }

    /// Start the loop on its own thread
    pub(crate) fn spawn(self) -> std::io::Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("edgevoice-transport".to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "failed to start transport runtime");
                self.state.transition(ConnectionState::Failed);
                return;
            }
        };

        runtime.block_on(self.serve());
    }

    async fn serve(mut self) {
        tracing::debug!("transport event loop started");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Connect { url } => {
                    if matches!(self.connect_and_drive(&url).await, Flow::Shutdown) {
                        break;
                    }
                }
                Command::Send { ack, .. } => {
                    let _ = ack.send(Err(Error::Transport("not connected".to_string())));
                }
                Command::Close { done } => {
                    let _ = done.send(());
                }
                Command::Shutdown => break,
            }
        }

        tracing::debug!("transport event loop stopped");
    }

    async fn connect_and_drive(&mut self, url: &str) -> Flow {
        self.state.transition(ConnectionState::Connecting);

        let stream = match self.open(url).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(url, error = %e, "connection failed");
                self.state.transition(ConnectionState::Failed);
                fire_fail(&self.handlers, &e.to_string());
                return Flow::Continue;
            }
        };

        if !self.state.transition(ConnectionState::Open) {
            // close() won the race while the handshake was in flight
            tracing::debug!(state = %self.state.get(), "dropping connection opened during close");
            let (mut sink, mut source) = stream.split();
            self.close_gracefully(&mut sink, &mut source).await;
            return Flow::Continue;
        }

        tracing::info!(url, "connection established");
        let mut outbox = Outbox::default();
        fire_open(&self.handlers, &mut outbox);
        self.drive(stream, outbox).await
    }

    async fn open(&self, url: &str) -> Result<WsStream> {
        let mut request = url.into_client_request()?;
        for (name, value) in &self.settings.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let connector = tls::connector(self.settings.accept_invalid_certs)?;
        let handshake = connect_async_tls_with_config(request, None, false, Some(connector));

        let (stream, response) = tokio::time::timeout(self.settings.handshake_timeout, handshake)
            .await
            .map_err(|_| {
                Error::Transport(format!(
                    "handshake timed out after {:?}",
                    self.settings.handshake_timeout
                ))
            })??;

        tracing::debug!(status = %response.status(), "websocket handshake complete");
        Ok(stream)
    }

    async fn drive(&mut self, stream: WsStream, mut outbox: Outbox) -> Flow {
        let (mut sink, mut source) = stream.split();
        if let Err(e) = flush(&mut sink, &mut outbox, self.settings.send_timeout).await {
            return self.fail(&e);
        }

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        fire_message(&self.handlers, &text, &mut outbox);
                        let flushed =
                            flush(&mut sink, &mut outbox, self.settings.send_timeout).await;
                        if let Err(e) = flushed {
                            return self.fail(&e);
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::trace!(len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "connection closed by peer");
                        // Pushes out the queued close reply
                        let _ =
                            tokio::time::timeout(self.settings.close_timeout, sink.flush()).await;
                        self.state.transition(ConnectionState::Disconnected);
                        fire_close(&self.handlers);
                        return Flow::Continue;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return self.fail(&Error::from(e)),
                    None => {
                        tracing::info!("connection stream ended");
                        self.state.transition(ConnectionState::Disconnected);
                        fire_close(&self.handlers);
                        return Flow::Continue;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send { frame, ack }) => {
                        match write(&mut sink, frame, self.settings.send_timeout).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e @ Error::SendTimeout(_)) => {
                                // A peer that stopped reading; the socket is unusable
                                let _ =
                                    ack.send(Err(Error::SendTimeout(self.settings.send_timeout)));
                                return self.fail(&e);
                            }
                            Err(e) => {
                                let _ = ack.send(Err(e));
                            }
                        }
                    }
                    Some(Command::Connect { .. }) => {
                        tracing::debug!("already connected, ignoring connect request");
                    }
                    Some(Command::Close { done }) => {
                        self.close_gracefully(&mut sink, &mut source).await;
                        self.state.transition(ConnectionState::Disconnected);
                        fire_close(&self.handlers);
                        let _ = done.send(());
                        return Flow::Continue;
                    }
                    Some(Command::Shutdown) | None => {
                        self.close_gracefully(&mut sink, &mut source).await;
                        self.state.transition(ConnectionState::Disconnected);
                        fire_close(&self.handlers);
                        return Flow::Shutdown;
                    }
                },
            }
        }
    }

    /// Send a normal-closure frame and wait briefly for the peer's reply
    async fn close_gracefully(&self, sink: &mut WsSink, source: &mut WsSource) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match tokio::time::timeout(
            self.settings.close_timeout,
            sink.send(Message::Close(Some(frame))),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "close frame not sent");
                return;
            }
            Err(_) => {
                tracing::debug!("close frame write stalled");
                return;
            }
        }

        let drained = tokio::time::timeout(self.settings.close_timeout, async {
            while let Some(Ok(message)) = source.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::debug!("peer did not acknowledge close in time");
        }
    }

    /// Mark the connection failed; the caller drops the socket
    fn fail(&self, error: &Error) -> Flow {
        tracing::warn!(error = %error, "connection error");
        self.state.transition(ConnectionState::Failed);
        fire_fail(&self.handlers, &error.to_string());
        Flow::Continue
    }
}

/// Write one text frame, giving up after `limit`
async fn write(sink: &mut WsSink, frame: String, limit: Duration) -> Result<()> {
    match tokio::time::timeout(limit, sink.send(Message::Text(frame))).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::SendTimeout(limit)),
    }
}

async fn flush(sink: &mut WsSink, outbox: &mut Outbox, limit: Duration) -> Result<()> {
    for frame in outbox.take() {
        write(sink, frame, limit).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_collects_frames_in_order() {
        let mut outbox = Outbox::default();
        assert!(outbox.is_empty());
        outbox.push("3");
        outbox.push(String::from("40/tts,{}"));
        assert_eq!(outbox.frames(), ["3", "40/tts,{}"]);
        assert_eq!(outbox.take(), vec!["3".to_string(), "40/tts,{}".to_string()]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn panicking_callback_is_contained() {
        let handlers: SharedHandlers = Arc::default();
        handlers
            .write()
            .unwrap()
            .message
            .replace(Box::new(|_, _| panic!("handler bug")));

        let mut outbox = Outbox::default();
        fire_message(&handlers, "4/tts,[]", &mut outbox);
        assert!(outbox.is_empty());
    }

    #[test]
    fn settings_follow_config() {
        let config = ConnectionConfig {
            handshake_timeout: Duration::from_secs(3),
            headers: vec![("X-A".to_string(), "1".to_string())],
            ..ConnectionConfig::default()
        };
        let settings = TransportSettings::from(&config);
        assert_eq!(settings.handshake_timeout, Duration::from_secs(3));
        assert_eq!(settings.send_timeout, config.send_timeout);
        assert_eq!(settings.headers.len(), 1);
        assert!(settings.accept_invalid_certs);
    }
}
