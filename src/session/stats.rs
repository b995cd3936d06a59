use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::capture::RecordingState;
use crate::socket::ConnectionState;

/// Statistics about a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub connection: ConnectionState,

    pub recording: RecordingState,

    /// When the current connection was established
    pub connected_since: Option<DateTime<Utc>>,

    /// Segments written to the socket
    pub segments_sent: usize,

    /// Segments dropped because the socket was not connected
    pub segments_dropped: usize,

    /// Audio replies queued for playback
    pub replies_received: usize,

    /// Interrupts received from the backend
    pub interrupts: usize,

    /// Inbound frames that were dropped (unparseable, unknown or ambiguous)
    pub malformed_frames: usize,

    /// Replies waiting for playback
    pub pending_playback: usize,
}

/// Running counters behind [`SessionStats`]
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub segments_sent: AtomicUsize,
    pub segments_dropped: AtomicUsize,
    pub replies_received: AtomicUsize,
    pub interrupts: AtomicUsize,
    pub malformed_frames: AtomicUsize,
}

impl SessionCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}
