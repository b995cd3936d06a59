use base64::Engine;

use super::messages::{AudioSegment, OutboundMessage};
use crate::error::SessionError;

/// Stateless transform from captured segments to wire messages
pub struct SegmentEncoder;

impl SegmentEncoder {
    /// Encode audio and optional image bytes as base64.
    ///
    /// Empty audio is rejected; an empty image is treated as absent.
    pub fn encode(segment: &AudioSegment) -> Result<OutboundMessage, SessionError> {
        if segment.audio.is_empty() {
            return Err(SessionError::EmptySegment);
        }

        let engine = base64::engine::general_purpose::STANDARD;

        Ok(OutboundMessage {
            audio_segment: engine.encode(&segment.audio),
            image: segment
                .image
                .as_deref()
                .filter(|image| !image.is_empty())
                .map(|image| engine.encode(image)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_audio_and_image() {
        let segment = AudioSegment::new(vec![0, 1, 2], Some(vec![0xff, 0xd8]));
        let msg = SegmentEncoder::encode(&segment).unwrap();

        assert_eq!(msg.audio_segment, "AAEC");
        assert_eq!(msg.image.as_deref(), Some("/9g="));
    }

    #[test]
    fn rejects_empty_audio() {
        let segment = AudioSegment::new(Vec::new(), Some(vec![1, 2, 3]));
        assert!(matches!(
            SegmentEncoder::encode(&segment),
            Err(SessionError::EmptySegment)
        ));
    }

    #[test]
    fn empty_image_is_dropped() {
        let segment = AudioSegment::new(vec![7], Some(Vec::new()));
        let msg = SegmentEncoder::encode(&segment).unwrap();
        assert!(msg.image.is_none());
    }
}
