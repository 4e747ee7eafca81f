//! Receiver loop: navigation events in, spoken audio out

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::{StreamLink, pause};
use crate::Result;
use crate::config::{ConnectionConfig, ListenConfig};
use crate::connection::{ConnectionManager, Outbox};
use crate::identity::ClientIdentity;
use crate::journal::FrameJournal;
use crate::protocol::{
    EventExtractor, NavigationEvent, PacketType, decode_and_reply, extractor_for, join_packet,
};
use crate::voice::{AudioIo, SpeechFetcher};

/// Decode one frame, queue protocol replies, and pull out a navigation event
///
/// Frames that are malformed, unrecognized, or not navigation events yield
/// `None`; nothing here fails.
pub fn dispatch_frame(
    raw: &str,
    outbox: &mut Outbox,
    extractor: &dyn EventExtractor,
) -> Option<NavigationEvent> {
    let Some(packet) = decode_and_reply(raw, outbox) else {
        if outbox.is_empty() {
            tracing::trace!(frame = raw, "dropping unrecognized frame");
        }
        return None;
    };

    match packet.packet_type {
        PacketType::Open => {
            match packet.handshake() {
                Some(info) => tracing::info!(
                    sid = %info.sid,
                    ping_interval = ?info.ping_interval,
                    "engine.io handshake"
                ),
                None => tracing::debug!("engine.io open without readable handshake"),
            }
            None
        }
        PacketType::Message => {
            let event = extractor.extract(packet.payload.as_deref()?);
            if event.is_none() {
                tracing::debug!(namespace = ?packet.namespace, "message without navigation event");
            }
            event
        }
        PacketType::Ping | PacketType::Pong => None,
    }
}

/// Register the receiver's callbacks on a connection
///
/// On open the namespace join packet is written. Navigation events found in
/// incoming frames are forwarded through the returned channel, which holds at
/// most `listen.event_queue` of them; events arriving while it is full are
/// dropped.
#[must_use]
pub fn attach_listener(
    manager: &ConnectionManager,
    listen: &ListenConfig,
    identity: &ClientIdentity,
    journal: Option<Arc<FrameJournal>>,
) -> mpsc::Receiver<NavigationEvent> {
    let (events, rx) = mpsc::channel(listen.event_queue.max(1));
    let extractor: Arc<dyn EventExtractor> = Arc::from(extractor_for(listen.extractor));
    let join = join_packet(&listen.namespace, identity);

    let open_journal = journal.clone();
    manager.on_open(move |outbox| {
        tracing::info!(packet = %join, "connection open, joining namespace");
        if let Some(journal) = &open_journal {
            journal.record("SEND", &join);
        }
        outbox.push(join.clone());
    });

    let message_journal = journal.clone();
    manager.on_message(move |text, outbox| {
        if let Some(journal) = &message_journal {
            journal.record("RECV", text);
        }
        if let Some(event) = dispatch_frame(text, outbox, extractor.as_ref()) {
            tracing::info!(text = %event.message, "navigation event");
            if let Some(journal) = &message_journal {
                journal.record("NAVIGATION", &event.message);
            }
            match events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(
                        text = %event.message,
                        "event queue full, dropping navigation event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("navigation event dropped, listener is gone");
                }
            }
        }
    });

    let close_journal = journal.clone();
    manager.on_close(move || {
        tracing::info!("event connection closed");
        if let Some(journal) = &close_journal {
            journal.record("CLOSE", "connection closed");
        }
    });

    manager.on_fail(move |reason| {
        tracing::warn!(reason, "event connection failed");
        if let Some(journal) = &journal {
            journal.record("ERROR", reason);
        }
    });

    rx
}

/// Fetch speech for `text` and play it once
///
/// # Errors
///
/// Returns error if the fetch or the playback fails
pub async fn speak_once(
    fetcher: &dyn SpeechFetcher,
    audio: &dyn AudioIo,
    text: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let bytes = fetcher.fetch(text).await?;
    audio.playback(&bytes, cancel).await
}

/// Speaks navigation events pushed by the event server
pub struct NavigationListener<L, F, A> {
    link: L,
    url: String,
    events: mpsc::Receiver<NavigationEvent>,
    fetcher: F,
    audio: A,
    journal: Option<Arc<FrameJournal>>,
    reconnect_delay: Duration,
    idle_wait: Duration,
}

impl<L: StreamLink, F: SpeechFetcher, A: AudioIo> NavigationListener<L, F, A> {
    #[must_use]
    pub fn new(
        link: L,
        url: String,
        events: mpsc::Receiver<NavigationEvent>,
        fetcher: F,
        audio: A,
        connection: &ConnectionConfig,
    ) -> Self {
        Self {
            link,
            url,
            events,
            fetcher,
            audio,
            journal: None,
            reconnect_delay: connection.reconnect_delay,
            idle_wait: connection.error_delay,
        }
    }

    /// Record fetch and playback results in a frame journal
    #[must_use]
    pub fn with_journal(mut self, journal: Option<Arc<FrameJournal>>) -> Self {
        self.journal = journal;
        self
    }

    /// Keep the connection up and speak events until `shutdown` fires
    pub async fn run(&mut self, shutdown: &CancellationToken) {
        tracing::info!(url = %self.url, "navigation listener started");

        while !shutdown.is_cancelled() {
            if !self.link.is_open() {
                tracing::info!(url = %self.url, "connecting");
                if !self.link.connect(&self.url).await {
                    tracing::warn!(delay = ?self.reconnect_delay, "connect failed, retrying later");
                    if !pause(self.reconnect_delay, shutdown).await {
                        break;
                    }
                    continue;
                }
            }

            let next = tokio::select! {
                () = shutdown.cancelled() => break,
                next = tokio::time::timeout(self.idle_wait, self.events.recv()) => next,
            };

            match next {
                Ok(Some(event)) => self.handle(&event, shutdown).await,
                Ok(None) => {
                    tracing::warn!("event channel closed");
                    break;
                }
                Err(_) => {}
            }
        }

        self.link.disconnect().await;
        tracing::info!("navigation listener stopped");
    }

    /// Speak one event; failures are logged and swallowed
    pub async fn handle(&self, event: &NavigationEvent, cancel: &CancellationToken) {
        match speak_once(&self.fetcher, &self.audio, &event.message, cancel).await {
            Ok(()) => {
                tracing::info!(text = %event.message, "navigation message spoken");
                self.note("PLAYED", &event.message);
            }
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), error = %e, "failed to speak navigation message");
                self.note("ERROR", &e.to_string());
            }
        }
    }

    fn note(&self, prefix: &str, text: &str) {
        if let Some(journal) = &self.journal {
            journal.record(prefix, text);
        }
    }
}
