//! Engine.IO / Socket.IO style packets for the event channel
//!
//! Only the subset the receiver needs is understood:
//!
//! ```text
//! 0{"sid":..}            open, handshake acknowledged
//! 2                      ping, answered with 3
//! 3                      pong
//! 4/tts,["evt",{..}]     message: namespace, first comma, JSON array
//! 42/tts,["evt",{..}]    same, with a Socket.IO sub-type digit
//! ```
//!
//! Anything else decodes to `None`. Decoding never fails.

use serde::Deserialize;

use crate::connection::Outbox;
use crate::identity::ClientIdentity;

/// Frame sent in reply to a ping
pub const PONG: &str = "3";

/// Engine.IO packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Open,
    Ping,
    Pong,
    Message,
}

impl PacketType {
    /// Map a single-digit packet code
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(Self::Open),
            '2' => Some(Self::Ping),
            '3' => Some(Self::Pong),
            '4' => Some(Self::Message),
            _ => None,
        }
    }
}

/// A decoded packet; ephemeral, handed straight to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePacket {
    pub packet_type: PacketType,
    pub namespace: Option<String>,
    /// Raw JSON text following the namespace
    pub payload: Option<String>,
}

/// Engine.IO open payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInfo {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: Option<u64>,
    #[serde(default)]
    pub ping_timeout: Option<u64>,
}

impl WirePacket {
    const fn bare(packet_type: PacketType, payload: Option<String>) -> Self {
        Self {
            packet_type,
            namespace: None,
            payload,
        }
    }

    /// Handshake details of an open packet, if its payload parses
    #[must_use]
    pub fn handshake(&self) -> Option<HandshakeInfo> {
        if self.packet_type != PacketType::Open {
            return None;
        }
        serde_json::from_str(self.payload.as_deref()?).ok()
    }
}

/// Decode a raw frame
///
/// Returns `None` for empty, malformed or unrecognized frames
#[must_use]
pub fn decode(raw: &str) -> Option<WirePacket> {
    let code = raw.chars().next()?;
    let rest = &raw[code.len_utf8()..];

    match PacketType::from_code(code)? {
        PacketType::Message => decode_message(rest),
        other => Some(WirePacket::bare(other, non_empty(rest))),
    }
}

/// Decode a frame and queue the protocol-level auto-reply
///
/// A ping queues exactly one pong and is not surfaced to the caller
pub fn decode_and_reply(raw: &str, outbox: &mut Outbox) -> Option<WirePacket> {
    let packet = decode(raw)?;
    if packet.packet_type == PacketType::Ping {
        tracing::trace!("ping received, queueing pong");
        outbox.push(PONG);
        return None;
    }
    Some(packet)
}

/// Namespace join packet carrying the device identity
#[must_use]
pub fn join_packet(namespace: &str, identity: &ClientIdentity) -> String {
    let auth = serde_json::json!({ "auth": { "deviceId": identity.as_str() } });
    let namespace = namespace.trim();
    if namespace.is_empty() || namespace == "/" {
        format!("40{auth}")
    } else {
        format!("40{namespace},{auth}")
    }
}

fn decode_message(rest: &str) -> Option<WirePacket> {
    // Socket.IO sub-type digit, e.g. the `2` of `42/tts,[..]`
    let rest = rest
        .strip_prefix(|c: char| c.is_ascii_digit())
        .unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }

    let (namespace, payload) = if rest.starts_with('/') {
        match rest.split_once(',') {
            Some((namespace, payload)) => (Some(namespace.to_string()), non_empty(payload)),
            None => (Some(rest.to_string()), None),
        }
    } else {
        (None, Some(rest.to_string()))
    };

    Some(WirePacket {
        packet_type: PacketType::Message,
        namespace,
        payload,
    })
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_splits_namespace_on_first_comma() {
        let packet = decode(r#"4/tts,["evt",{"a":"x,y"}]"#).unwrap();
        assert_eq!(packet.packet_type, PacketType::Message);
        assert_eq!(packet.namespace.as_deref(), Some("/tts"));
        assert_eq!(packet.payload.as_deref(), Some(r#"["evt",{"a":"x,y"}]"#));
    }

    #[test]
    fn socketio_subtype_is_stripped_from_namespace() {
        let packet = decode(r#"42/tts,["navigation",{"message":"hi"}]"#).unwrap();
        assert_eq!(packet.namespace.as_deref(), Some("/tts"));
        assert_eq!(
            packet.payload.as_deref(),
            Some(r#"["navigation",{"message":"hi"}]"#)
        );
    }

    #[test]
    fn default_namespace_keeps_whole_payload() {
        let packet = decode(r#"42["evt",{"k":1}]"#).unwrap();
        assert_eq!(packet.namespace, None);
        assert_eq!(packet.payload.as_deref(), Some(r#"["evt",{"k":1}]"#));
    }

    #[test]
    fn namespace_without_payload() {
        let packet = decode("40/tts").unwrap();
        assert_eq!(packet.namespace.as_deref(), Some("/tts"));
        assert_eq!(packet.payload, None);
    }

    #[test]
    fn open_exposes_handshake() {
        let packet =
            decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        assert_eq!(packet.packet_type, PacketType::Open);
        let info = packet.handshake().unwrap();
        assert_eq!(info.sid, "abc");
        assert_eq!(info.ping_interval, Some(25000));
        assert_eq!(info.ping_timeout, Some(20000));
    }

    #[test]
    fn open_with_garbage_payload_is_still_open() {
        let packet = decode("0{not json").unwrap();
        assert_eq!(packet.packet_type, PacketType::Open);
        assert_eq!(packet.handshake(), None);
    }

    #[test]
    fn malformed_frames_are_noops() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("9garbage"), None);
        assert_eq!(decode("x"), None);
        assert_eq!(decode("4"), None);
        assert_eq!(decode("42"), None);
        assert_eq!(decode("é"), None);
    }

    #[test]
    fn ping_queues_single_pong_and_is_hidden() {
        let mut outbox = Outbox::default();
        assert_eq!(decode_and_reply("2", &mut outbox), None);
        assert_eq!(outbox.frames(), ["3"]);
    }

    #[test]
    fn non_ping_frames_queue_nothing() {
        let mut outbox = Outbox::default();
        assert!(decode_and_reply(r#"4/tts,["evt",{}]"#, &mut outbox).is_some());
        assert!(decode_and_reply("3", &mut outbox).is_some());
        assert!(decode_and_reply("9garbage", &mut outbox).is_none());
        assert!(outbox.is_empty());
    }

    #[test]
    fn join_packet_embeds_identity() {
        let id = ClientIdentity::fixed("0612").unwrap();
        assert_eq!(
            join_packet("/tts", &id),
            r#"40/tts,{"auth":{"deviceId":"0612"}}"#
        );
        assert_eq!(join_packet("/", &id), r#"40{"auth":{"deviceId":"0612"}}"#);
    }
}
