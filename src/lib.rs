pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod socket;

use std::sync::{Mutex, MutexGuard};

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
    SegmentBuffer, SegmentFormat, SilenceBackend, WavFileBackend,
};
pub use capture::{
    CaptureController, CaptureSettings, FrameSource, RecordingState, SegmentReport, SegmentSink,
    StillImageFile, ToggleOutcome,
};
pub use config::Config;
pub use error::{FrameError, SessionError};
pub use playback::{PlaybackCoordinator, PlaybackItem};
pub use protocol::{AudioReply, AudioSegment, InboundEvent, OutboundMessage, SegmentEncoder};
pub use session::{EventBus, SessionConfig, SessionStats, SubscriptionId, VoiceSession};
pub use socket::{ConnectionState, Connector, LoopbackConnector, LoopbackPeer, SessionSocket, WsConnector};

/// Lock a std mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
