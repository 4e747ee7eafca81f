//! Error types for edgevoice

use thiserror::Error;

/// Result type alias for edgevoice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while streaming speech
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Connect, handshake or send failure on the streaming connection
    #[error("transport error: {0}")]
    Transport(String),

    /// External capture or playback utility failed
    #[error("process error: {0}")]
    Process(String),

    /// External utility exceeded its time budget
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Frame write not acknowledged by the transport in time
    #[error("send not acknowledged within {0:?}")]
    SendTimeout(std::time::Duration),

    /// Operation was cancelled before it finished
    #[error("cancelled")]
    Cancelled,

    /// Malformed or unrecognized frame
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Speech synthesis fetch failed
    #[error("speech fetch error: {0}")]
    Fetch(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Recovery class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reconnect after a fixed delay
    Transport,
    /// Short delay, retry next cycle
    Process,
    /// Drop the frame and keep dispatching
    Protocol,
    /// Abort the current cycle
    Io,
}

impl Error {
    /// Classify this error for the orchestration loops
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_)
            | Self::SendTimeout(_)
            | Self::WebSocket(_)
            | Self::Http(_)
            | Self::Fetch(_) => ErrorKind::Transport,
            Self::Process(_) | Self::Timeout(_) | Self::Cancelled => ErrorKind::Process,
            Self::Protocol(_) | Self::Serialization(_) => ErrorKind::Protocol,
            Self::Io(_) | Self::Config(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_recovery_class() {
        assert_eq!(Error::Transport("down".into()).kind(), ErrorKind::Transport);
        assert_eq!(Error::Fetch("503".into()).kind(), ErrorKind::Transport);
        assert_eq!(
            Error::Timeout(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Process
        );
        assert_eq!(
            Error::SendTimeout(std::time::Duration::from_secs(5)).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Process);
        assert_eq!(Error::Protocol("bad".into()).kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::Io(std::io::Error::other("disk")).kind(),
            ErrorKind::Io
        );
    }
}
