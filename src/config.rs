//! Configuration for edgevoice
//!
//! Every setting has a documented default so the library works without the
//! CLI. The binary fills these structs from flags and environment variables
//! (`ARECORD_DEVICE`, `ARECORD_FORMAT`, `ARECORD_RATE`, `WS_URL`, `TTS_URL`, ...)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Default ASR streaming server
pub const DEFAULT_STREAM_URL: &str = "wss://robot-asr.pvi.digital";

/// Default Socket.IO event server
pub const DEFAULT_LISTEN_URL: &str = "wss://robot-api1.pvi.digital";

/// Default speech synthesis endpoint
pub const DEFAULT_TTS_URL: &str = "https://robot-asr.pvi.digital/api/tts/stream";

/// Default Socket.IO namespace for navigation events
pub const DEFAULT_NAMESPACE: &str = "/tts";

/// Default receiver device identifier
pub const DEFAULT_DEVICE_ID: &str = "0612";

/// Navigation events held while an earlier one is still being spoken
pub const DEFAULT_EVENT_QUEUE: usize = 16;

/// Complete client configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Audio capture settings
    pub capture: CaptureConfig,

    /// Audio playback settings
    pub playback: PlaybackConfig,

    /// Streaming connection settings
    pub connection: ConnectionConfig,

    /// Speech synthesis settings
    pub speech: SpeechConfig,

    /// Receiver settings
    pub listen: ListenConfig,
}

/// Capture via `arecord`
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture program (normally `arecord`)
    pub program: String,

    /// ALSA capture device
    pub device: String,

    /// Sample format passed to the capture utility
    pub format: String,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count announced to the server
    pub channels: u16,

    /// Chunk size announced to the server
    pub chunk_size: u32,

    /// Format name announced in the config envelope
    pub audio_format: String,

    /// Length of each recorded clip
    pub clip_duration: Duration,

    /// Upper bound on a single capture invocation
    pub timeout: Duration,

    /// Directory where clips are written before sending
    pub spool_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "arecord".to_string(),
            device: "hw:5,0".to_string(),
            format: "S16_LE".to_string(),
            sample_rate: 16000,
            channels: 1,
            chunk_size: 1024,
            audio_format: "pcm16".to_string(),
            clip_duration: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            spool_dir: PathBuf::from("."),
        }
    }
}

/// Local playback utility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Player {
    /// ALSA `aplay -D <device>`
    #[default]
    Aplay,
    /// PulseAudio `paplay`
    Paplay,
}

impl Player {
    /// Executable name
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Aplay => "aplay",
            Self::Paplay => "paplay",
        }
    }
}

impl FromStr for Player {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aplay" => Ok(Self::Aplay),
            "paplay" => Ok(Self::Paplay),
            other => Err(Error::Config(format!("unknown player: {other}"))),
        }
    }
}

/// Playback settings
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Which utility plays audio
    pub player: Player,

    /// ALSA playback device (used by `aplay` only)
    pub device: String,

    /// Upper bound on a single playback invocation
    pub timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: Player::Aplay,
            device: "plughw:6,0".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Streaming connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Base server URL (`wss://host[:port]`)
    pub url: String,

    /// Skip certificate validation so inspection proxies can sit in the path
    pub accept_invalid_certs: bool,

    /// Interval between connection state polls in `connect()`
    pub poll_interval: Duration,

    /// Number of polls before `connect()` gives up
    pub poll_attempts: u32,

    /// Upper bound on the WebSocket handshake on the transport thread
    pub handshake_timeout: Duration,

    /// Upper bound on waiting for a write acknowledgement
    pub send_timeout: Duration,

    /// Upper bound on the closing handshake
    pub close_timeout: Duration,

    /// Delay before reconnecting after a failed connect
    pub reconnect_delay: Duration,

    /// Delay after a failed capture or cycle error
    pub error_delay: Duration,

    /// Extra headers sent with the WebSocket handshake
    pub headers: Vec<(String, String)>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            accept_invalid_certs: true,
            poll_interval: Duration::from_millis(100),
            poll_attempts: 10,
            handshake_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(5),
            error_delay: Duration::from_secs(1),
            headers: Vec::new(),
        }
    }
}

/// Speech synthesis endpoint settings
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Endpoint receiving `{"text": ...}` and answering with audio bytes
    pub url: String,

    /// Request timeout
    pub timeout: Duration,

    /// Skip certificate validation for the endpoint
    pub accept_invalid_certs: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.to_string(),
            timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
        }
    }
}

/// Navigation event extraction strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Substring search for the `"message":"` field
    #[default]
    Marker,
    /// Structural JSON parse
    Json,
}

impl FromStr for ExtractorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "marker" => Ok(Self::Marker),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown extractor: {other}"))),
        }
    }
}

/// Receiver settings
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Socket.IO namespace to join
    pub namespace: String,

    /// Identifier sent in the namespace join packet
    pub device_id: String,

    /// Directory for the frame journal; `None` disables it
    pub journal_dir: Option<PathBuf>,

    /// How navigation events are pulled out of message payloads
    pub extractor: ExtractorKind,

    /// Pending navigation events; newer ones are dropped when full
    pub event_queue: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            journal_dir: None,
            extractor: ExtractorKind::Marker,
            event_queue: DEFAULT_EVENT_QUEUE,
        }
    }
}

/// Parse a `Name: value` header argument
///
/// # Errors
///
/// Returns error if the argument has no `:` separator or an empty name
pub fn parse_header(raw: &str) -> crate::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::Config(format!("header must be `Name: value`: {raw}")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Config(format!("header name is empty: {raw}")));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
