//! JSON envelopes for the ASR streaming channel

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::identity::ClientIdentity;
use crate::{Error, Result};

/// Timestamp layout embedded in audio envelopes (local time, seconds)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Audio parameters announced once per connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub audio_format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_size: u32,
}

/// Outgoing message on the streaming connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Stream configuration
    Config { config: AudioConfig },
    /// One captured clip
    Audio {
        /// Base64 of the raw clip bytes
        data: String,
        timestamp: String,
        client_id: String,
    },
}

impl Envelope {
    /// Serialize to the text frame sent on the wire
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the base64 audio field back into the original bytes
    ///
    /// # Errors
    ///
    /// Returns error if this is not an audio envelope or the field is not
    /// valid base64
    pub fn audio_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Audio { data, .. } => STANDARD
                .decode(data)
                .map_err(|e| Error::Protocol(format!("invalid base64 audio: {e}"))),
            Self::Config { .. } => Err(Error::Protocol(
                "config envelope carries no audio".to_string(),
            )),
        }
    }

    /// Short name for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Audio { .. } => "audio",
        }
    }
}

/// Build the configuration envelope
///
/// # Errors
///
/// Returns error if `audio_format` is empty
pub fn encode_config(
    audio_format: &str,
    sample_rate: u32,
    channels: u16,
    chunk_size: u32,
) -> Result<Envelope> {
    if audio_format.trim().is_empty() {
        return Err(Error::Config("audio format cannot be empty".to_string()));
    }

    Ok(Envelope::Config {
        config: AudioConfig {
            audio_format: audio_format.to_string(),
            sample_rate,
            channels,
            chunk_size,
        },
    })
}

/// Build an audio envelope stamped with the current local time
#[must_use]
pub fn encode_audio(bytes: &[u8], client: &ClientIdentity) -> Envelope {
    encode_audio_at(bytes, client, Local::now())
}

/// Build an audio envelope with an explicit timestamp
#[must_use]
pub fn encode_audio_at(bytes: &[u8], client: &ClientIdentity, at: DateTime<Local>) -> Envelope {
    Envelope::Audio {
        data: STANDARD.encode(bytes),
        timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        client_id: client.as_str().to_string(),
    }
}

/// Message pushed back by the ASR service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Session accepted
    Connected {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        server_info: Option<serde_json::Value>,
    },
    /// Recognition progress or result
    Transcription {
        #[serde(default)]
        event_type: String,
        #[serde(default)]
        text: String,
    },
    /// Keepalive answer
    Pong,
    /// Server-side failure
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Config envelope accepted
    ConfigAck {
        #[serde(default)]
        message: Option<String>,
    },
    /// Anything this client does not know about
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Parse a text frame; malformed frames yield `None`
    #[must_use]
    pub fn parse(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }
}
