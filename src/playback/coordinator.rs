use std::collections::VecDeque;

use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::FrameError;
use crate::protocol::AudioReply;

/// One synthesized reply waiting for (or undergoing) playback
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackItem {
    /// Arrival order, starting at 0 for the session
    pub sequence: u64,
    /// Decoded audio bytes
    pub audio: Vec<u8>,
    pub word_timings: Option<serde_json::Value>,
    pub sample_rate: Option<u32>,
    pub method: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Ordered playback queue with interrupt semantics.
///
/// Replies are handed out strictly in arrival order. An interrupt discards
/// every reply queued before it, including the one currently playing, and
/// leaves replies that arrive afterwards untouched.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    queue: VecDeque<PlaybackItem>,
    /// Sequence of the item handed to the consumer and not yet finished
    current: Option<u64>,
    next_sequence: u64,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and queue a reply. Returns the queued item for the "audio available" signal.
    pub fn enqueue(&mut self, reply: AudioReply) -> Result<PlaybackItem, FrameError> {
        let audio = base64::engine::general_purpose::STANDARD.decode(reply.audio.as_bytes())?;

        let item = PlaybackItem {
            sequence: self.next_sequence,
            audio,
            word_timings: reply.word_timings,
            sample_rate: reply.sample_rate,
            method: reply.method,
            received_at: Utc::now(),
        };
        self.next_sequence += 1;

        debug!(
            "Queued reply #{} ({} bytes, {} pending)",
            item.sequence,
            item.audio.len(),
            self.queue.len() + 1
        );
        self.queue.push_back(item.clone());

        Ok(item)
    }

    /// Flush everything queued and stop the current item. Returns how many items were discarded.
    pub fn interrupt(&mut self) -> usize {
        let flushed = self.queue.len() + usize::from(self.current.is_some());
        self.queue.clear();
        self.current = None;

        info!("Playback interrupted ({} items discarded)", flushed);
        flushed
    }

    /// Hand the oldest queued item to the consumer
    pub fn next(&mut self) -> Option<PlaybackItem> {
        let item = self.queue.pop_front()?;
        self.current = Some(item.sequence);
        Some(item)
    }

    /// Mark an item as played. Returns `false` if it is not the current item,
    /// for instance because an interrupt already stopped it.
    pub fn finish(&mut self, sequence: u64) -> bool {
        if self.current == Some(sequence) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<u64> {
        self.current
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queued items, oldest first
    pub fn queued(&self) -> impl Iterator<Item = &PlaybackItem> {
        self.queue.iter()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current.is_none()
    }
}
