//! Local recording: state machine, device lifecycle and still-frame capture

pub mod camera;
pub mod controller;
pub mod state;

pub use camera::{FrameSource, StillImageFile};
pub use controller::{CaptureController, CaptureSettings, SegmentReport, SegmentSink, ToggleOutcome};
pub use state::RecordingState;
