//! Wire protocols
//!
//! - `envelope`: JSON config/audio envelopes for the ASR streaming channel
//! - `socketio`: multiplexed Engine.IO/Socket.IO packets for the event channel
//! - `extract`: navigation event extraction from message payloads

mod envelope;
mod extract;
mod socketio;

pub use envelope::{
    AudioConfig, Envelope, ServerEvent, encode_audio, encode_audio_at, encode_config,
};
pub use extract::{
    EventExtractor, JsonExtractor, MarkerExtractor, NavigationEvent, extractor_for,
};
pub use socketio::{
    HandshakeInfo, PONG, PacketType, WirePacket, decode, decode_and_reply, join_packet,
};

use crate::identity::ClientIdentity;

/// Streaming endpoint for one client
#[must_use]
pub fn asr_stream_url(base: &str, client: &ClientIdentity) -> String {
    format!(
        "{}/api/asr-batch-stream/ws/{}",
        base.trim_end_matches('/'),
        client.as_str()
    )
}

/// Socket.IO endpoint over a plain WebSocket transport
#[must_use]
pub fn socketio_url(base: &str) -> String {
    format!(
        "{}/socket.io/?EIO=4&transport=websocket",
        base.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_embeds_client() {
        let id = ClientIdentity::fixed("deadbeef").unwrap();
        assert_eq!(
            asr_stream_url("wss://asr.example/", &id),
            "wss://asr.example/api/asr-batch-stream/ws/deadbeef"
        );
    }

    #[test]
    fn socketio_url_requests_websocket_transport() {
        assert_eq!(
            socketio_url("wss://events.example"),
            "wss://events.example/socket.io/?EIO=4&transport=websocket"
        );
    }
}
