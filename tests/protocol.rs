//! Wire protocol behavior through the public API

use edgevoice::ClientIdentity;
use edgevoice::client::dispatch_frame;
use edgevoice::connection::Outbox;
use edgevoice::protocol::{
    EventExtractor, JsonExtractor, MarkerExtractor, PacketType, decode, decode_and_reply,
    encode_audio, encode_config,
};

#[test]
fn audio_field_round_trips_any_bytes() {
    let id = ClientIdentity::generate();
    let samples: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0],
        vec![0xff; 3],
        (0..=255).collect(),
        (0..=255u8).rev().cycle().take(64_001).collect(),
    ];

    for bytes in samples {
        let envelope = encode_audio(&bytes, &id);
        assert_eq!(envelope.audio_bytes().unwrap(), bytes);
    }
}

#[test]
fn audio_frame_carries_identity_and_timestamp() {
    let id = ClientIdentity::fixed("a1b2c3d4").unwrap();
    let frame = encode_audio(b"pcm", &id).to_frame().unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

    assert_eq!(value["type"], "audio");
    assert_eq!(value["data"], "cGNt");
    assert_eq!(value["client_id"], "a1b2c3d4");
    let timestamp = value["timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), "2025-01-01T12:00:00".len());
    assert_eq!(&timestamp[10..11], "T");
}

#[test]
fn config_requires_a_format() {
    assert!(encode_config("", 16000, 1, 1024).is_err());
    assert!(encode_config("pcm16", 16000, 1, 1024).is_ok());
}

#[test]
fn ping_produces_one_pong_and_no_packet() {
    let mut outbox = Outbox::default();
    assert_eq!(decode_and_reply("2", &mut outbox), None);
    assert_eq!(outbox.frames(), ["3"]);
}

#[test]
fn navigation_event_is_extracted_from_message() {
    let mut outbox = Outbox::default();
    let event = dispatch_frame(
        r#"4/tts,["evt",{"navigation":true,"message":"go"}]"#,
        &mut outbox,
        &MarkerExtractor,
    );
    assert_eq!(event.unwrap().message, "go");

    let event = dispatch_frame(r#"4/tts,["evt",{"other":1}]"#, &mut outbox, &MarkerExtractor);
    assert_eq!(event, None);
    assert!(outbox.is_empty());
}

#[test]
fn malformed_frames_are_no_ops() {
    for raw in ["", "9garbage", "x", "4", "\u{1F600}"] {
        let mut outbox = Outbox::default();
        assert_eq!(decode_and_reply(raw, &mut outbox), None, "frame {raw:?}");
        assert!(outbox.is_empty());
        assert_eq!(dispatch_frame(raw, &mut outbox, &JsonExtractor), None);
    }
}

#[test]
fn message_namespace_and_payload_split_on_first_comma() {
    let packet = decode(r#"42/tts,["evt",{"a":1,"b":2}]"#).unwrap();
    assert_eq!(packet.packet_type, PacketType::Message);
    assert_eq!(packet.namespace.as_deref(), Some("/tts"));
    assert_eq!(packet.payload.as_deref(), Some(r#"["evt",{"a":1,"b":2}]"#));
}

#[test]
fn extractors_agree_on_plain_messages() {
    let payload = r#"["navigation",{"message":"turn right","link":"/map"}]"#;
    assert_eq!(
        MarkerExtractor.extract(payload),
        JsonExtractor.extract(payload)
    );
}
