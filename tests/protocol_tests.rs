// Integration tests for the wire protocol
//
// These tests verify outbound framing and inbound frame classification.

use anyhow::Result;
use base64::Engine;
use talkmate_client::{AudioSegment, FrameError, InboundEvent, SegmentEncoder, SessionError};

#[test]
fn test_encode_audio_only() -> Result<()> {
    let segment = AudioSegment::new(vec![0x00, 0x01, 0x02], None);

    let message = SegmentEncoder::encode(&segment)?;
    let json: serde_json::Value = serde_json::from_str(&message.to_json()?)?;

    assert_eq!(json["audio_segment"], "AAEC");
    assert!(json.get("image").is_none(), "Absent image must not be serialized");

    Ok(())
}

#[test]
fn test_encode_with_image() -> Result<()> {
    let segment = AudioSegment::new(vec![0x00, 0x01, 0x02], Some(vec![0xFF, 0xD8]));

    let message = SegmentEncoder::encode(&segment)?;
    let json: serde_json::Value = serde_json::from_str(&message.to_json()?)?;

    assert_eq!(json["audio_segment"], "AAEC");
    assert_eq!(json["image"], "/9g=");

    Ok(())
}

#[test]
fn test_encoding_is_lossless() -> Result<()> {
    let engine = base64::engine::general_purpose::STANDARD;
    let every_byte: Vec<u8> = (0..=255u8).collect();

    for len in [1, 2, 3, 5, 255, 256] {
        let audio: Vec<u8> = every_byte.iter().copied().cycle().take(len).collect();
        let image: Vec<u8> = audio.iter().rev().copied().collect();

        let message = SegmentEncoder::encode(&AudioSegment::new(audio.clone(), Some(image.clone())))?;
        let wire: serde_json::Value = serde_json::from_str(&message.to_json()?)?;

        let decoded_audio = engine.decode(wire["audio_segment"].as_str().unwrap_or_default())?;
        let decoded_image = engine.decode(wire["image"].as_str().unwrap_or_default())?;
        assert_eq!(decoded_audio, audio, "audio of {} bytes", len);
        assert_eq!(decoded_image, image, "image of {} bytes", len);
    }

    Ok(())
}

#[test]
fn test_encode_rejects_empty_audio() {
    let segment = AudioSegment::new(Vec::new(), Some(vec![0xFF]));

    assert!(matches!(
        SegmentEncoder::encode(&segment),
        Err(SessionError::EmptySegment)
    ));
}

#[test]
fn test_parse_audio_reply_with_metadata() -> Result<()> {
    let frame = r#"{"audio":"QQ==","word_timings":[{"word":"hi","start":0.0}],"sample_rate":24000,"method":"tts"}"#;

    match InboundEvent::parse(frame)? {
        InboundEvent::AudioReply(reply) => {
            assert_eq!(reply.audio, "QQ==");
            assert_eq!(reply.sample_rate, Some(24000));
            assert_eq!(reply.method.as_deref(), Some("tts"));
            assert!(reply.word_timings.is_some());
        }
        other => panic!("Expected audio reply, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_parse_interrupt() -> Result<()> {
    assert_eq!(InboundEvent::parse(r#"{"interrupt":true}"#)?, InboundEvent::Interrupt);
    Ok(())
}

#[test]
fn test_parse_rejects_unknown_and_malformed_frames() {
    assert!(matches!(InboundEvent::parse(r#"{"status":"ok"}"#), Err(FrameError::Unknown)));
    assert!(matches!(InboundEvent::parse(r#"{"interrupt":false}"#), Err(FrameError::Unknown)));
    assert!(matches!(InboundEvent::parse(r#"{"audio":""}"#), Err(FrameError::Unknown)));
    assert!(matches!(InboundEvent::parse("not json"), Err(FrameError::Json(_))));
}

#[test]
fn test_parse_rejects_array_frames() {
    assert!(matches!(InboundEvent::parse(r#"["QQ=="]"#), Err(FrameError::Unknown)));
}

#[test]
fn test_parse_rejects_audio_with_interrupt() {
    let frame = r#"{"audio":"QQ==","interrupt":true}"#;
    assert!(matches!(InboundEvent::parse(frame), Err(FrameError::Ambiguous)));
}
