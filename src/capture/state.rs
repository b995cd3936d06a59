use serde::{Deserialize, Serialize};
use std::fmt;

/// Recording state machine.
///
/// State transitions:
/// ```text
/// idle → listening → recording → processing → idle
///           ↓            ↓
///          idle  (device failure / abort)
/// ```
///
/// `listening` covers device acquisition and is never published to
/// subscribers on its own: a failed acquisition returns to `idle` without a
/// visible transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    #[default]
    Idle,
    Listening,
    Recording,
    Processing,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Recording => "recording",
            Self::Processing => "processing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Whether a published transition `self → next` is part of the state machine
    pub fn can_transition_to(&self, next: RecordingState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Listening)
                | (Self::Idle, Self::Recording)
                | (Self::Listening, Self::Recording)
                | (Self::Listening, Self::Idle)
                | (Self::Recording, Self::Processing)
                | (Self::Recording, Self::Idle)
                | (Self::Processing, Self::Idle)
        )
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
