use thiserror::Error;

use crate::capture::RecordingState;

/// Errors raised by the streaming session.
///
/// Only `DeviceAccess` and `ConnectionFailed` reach error subscribers.
/// Malformed frames are logged and dropped where they are parsed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not access capture device: {0}")]
    DeviceAccess(String),

    #[error("connection failed")]
    ConnectionFailed,

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    #[error("audio segment is empty")]
    EmptySegment,

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RecordingState,
    },
}

/// Reasons an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("audio payload is not valid base64: {0}")]
    InvalidAudio(#[from] base64::DecodeError),

    #[error("frame carries both audio and interrupt")]
    Ambiguous,

    #[error("frame matches no known message")]
    Unknown,
}
