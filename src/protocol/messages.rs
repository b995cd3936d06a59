use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FrameError;

/// One finished utterance, as handed over by the capture controller
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Finalized audio blob (PCM or WAV, see `SegmentFormat`)
    pub audio: Vec<u8>,
    /// Optional still frame captured when recording stopped
    pub image: Option<Vec<u8>>,
    /// When the recording was stopped
    pub captured_at: DateTime<Utc>,
}

impl AudioSegment {
    pub fn new(audio: Vec<u8>, image: Option<Vec<u8>>) -> Self {
        Self {
            audio,
            image,
            captured_at: Utc::now(),
        }
    }
}

/// Audio segment message sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub audio_segment: String, // Base64-encoded audio bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>, // Base64-encoded still frame
}

impl OutboundMessage {
    /// Serialize to the single JSON text frame written on the socket
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Synthesized audio pushed by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct AudioReply {
    /// Base64-encoded audio, decoded when it is queued for playback
    pub audio: String,
    /// Opaque timing data for lip-sync or captions
    pub word_timings: Option<serde_json::Value>,
    pub sample_rate: Option<u32>,
    /// Name of the synthesis method the backend used
    pub method: Option<String>,
}

/// Event carried by one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    AudioReply(AudioReply),
    Interrupt,
}

impl InboundEvent {
    /// Classify one inbound text frame.
    ///
    /// Only JSON objects are considered. A frame is an `AudioReply` when it
    /// carries a non-empty `audio` string and an `Interrupt` when `interrupt`
    /// is `true`. Frames matching both are rejected as `Ambiguous`, frames
    /// matching neither as `Unknown`. Malformed optional metadata is dropped
    /// without losing the audio.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let Some(frame) = value.as_object() else {
            return Err(FrameError::Unknown);
        };

        let audio = frame
            .get("audio")
            .and_then(|a| a.as_str())
            .filter(|a| !a.is_empty());
        let interrupt = frame.get("interrupt").and_then(|i| i.as_bool()) == Some(true);

        match (audio, interrupt) {
            (Some(_), true) => Err(FrameError::Ambiguous),
            (Some(audio), false) => Ok(InboundEvent::AudioReply(AudioReply {
                audio: audio.to_string(),
                word_timings: frame.get("word_timings").filter(|t| !t.is_null()).cloned(),
                sample_rate: optional_field(frame, "sample_rate", |v| {
                    v.as_u64().and_then(|rate| u32::try_from(rate).ok())
                }),
                method: optional_field(frame, "method", |v| v.as_str().map(str::to_string)),
            })),
            (None, true) => Ok(InboundEvent::Interrupt),
            (None, false) => Err(FrameError::Unknown),
        }
    }
}

/// Read an optional field, ignoring (and logging) values of the wrong type
fn optional_field<T>(
    frame: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    read: impl FnOnce(&serde_json::Value) -> Option<T>,
) -> Option<T> {
    let value = frame.get(key).filter(|v| !v.is_null())?;
    let parsed = read(value);
    if parsed.is_none() {
        debug!("Ignoring invalid {} in audio reply: {}", key, value);
    }
    parsed
}
