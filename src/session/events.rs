use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::capture::RecordingState;
use crate::error::SessionError;
use crate::lock_or_recover;
use crate::playback::PlaybackItem;
use crate::socket::ConnectionState;

/// Handle returned by every subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered subscriber list for one event kind
struct Subscribers<T> {
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Subscribers<T> {
    fn add(&self, id: SubscriptionId, callback: Callback<T>) {
        lock_or_recover(&self.entries).push((id, callback));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = lock_or_recover(&self.entries);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn emit(&self, value: &T) {
        // Snapshot so callbacks may subscribe or unsubscribe re-entrantly
        let callbacks: Vec<Callback<T>> = lock_or_recover(&self.entries)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }
}

/// Fan-out of session events to subscribers, in registration order
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    audio_received: Subscribers<PlaybackItem>,
    interrupted: Subscribers<()>,
    errors: Subscribers<SessionError>,
    status: Subscribers<ConnectionState>,
    recording: Subscribers<RecordingState>,
    level: Subscribers<f32>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_audio_received(&self, f: impl Fn(&PlaybackItem) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.audio_received.add(id, Arc::new(f));
        id
    }

    pub fn on_interrupt(&self, f: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.interrupted.add(id, Arc::new(move |_: &()| f()));
        id
    }

    pub fn on_error(&self, f: impl Fn(&SessionError) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.errors.add(id, Arc::new(f));
        id
    }

    pub fn on_status_change(&self, f: impl Fn(ConnectionState) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.status.add(id, Arc::new(move |state: &ConnectionState| f(*state)));
        id
    }

    pub fn on_recording_state_change(
        &self,
        f: impl Fn(RecordingState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.recording.add(id, Arc::new(move |state: &RecordingState| f(*state)));
        id
    }

    pub fn on_audio_level(&self, f: impl Fn(f32) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.level.add(id, Arc::new(move |level: &f32| f(*level)));
        id
    }

    /// Remove a subscription of any kind. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.audio_received.remove(id)
            | self.interrupted.remove(id)
            | self.errors.remove(id)
            | self.status.remove(id)
            | self.recording.remove(id)
            | self.level.remove(id)
    }

    pub fn audio_received(&self, item: &PlaybackItem) {
        self.audio_received.emit(item);
    }

    pub fn interrupted(&self) {
        self.interrupted.emit(&());
    }

    pub fn error(&self, error: &SessionError) {
        self.errors.emit(error);
    }

    pub fn status(&self, state: ConnectionState) {
        self.status.emit(&state);
    }

    pub fn recording_state(&self, state: RecordingState) {
        self.recording.emit(&state);
    }

    pub fn audio_level(&self, level: f32) {
        self.level.emit(&level);
    }
}
