//! Edgevoice - resilient speech streaming client for edge devices
//!
//! Two independent clients share one connection core:
//! - Sender: records clips with `arecord`, wraps them in JSON envelopes and
//!   streams them to an ASR service over a secure WebSocket
//! - Receiver: joins a Socket.IO namespace, picks navigation events out of
//!   pushed messages, fetches synthesized speech over HTTP and plays it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Orchestration thread                  │
//! │   AudioStreamer (sender)  │  NavigationListener      │
//! └──────────┬──────────────────────────┬───────────────┘
//!            │ StreamLink               │ AudioIo / SpeechFetcher
//! ┌──────────▼──────────────┐  ┌────────▼───────────────┐
//! │   ConnectionManager      │  │  arecord / aplay / HTTP │
//! │   state (atomic)         │  │  (supervised)           │
//! └──────────┬──────────────┘  └────────────────────────┘
//!            │ commands
//! ┌──────────▼──────────────────────────────────────────┐
//! │   Transport thread: WebSocket event loop, callbacks  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dump;
pub mod error;
pub mod identity;
pub mod journal;
pub mod protocol;
pub mod voice;

pub use client::{AudioStreamer, NavigationListener, StreamLink};
pub use config::Config;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{Error, ErrorKind, Result};
pub use identity::ClientIdentity;
pub use journal::FrameJournal;
