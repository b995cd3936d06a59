use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::config::SessionConfig;
use super::events::{EventBus, SubscriptionId};
use super::stats::{SessionCounters, SessionStats};
use crate::audio::AudioBackend;
use crate::capture::{
    CaptureController, FrameSource, RecordingState, SegmentReport, SegmentSink, ToggleOutcome,
};
use crate::error::SessionError;
use crate::lock_or_recover;
use crate::playback::{PlaybackCoordinator, PlaybackItem};
use crate::protocol::{AudioSegment, InboundEvent, SegmentEncoder};
use crate::socket::{ConnectionState, Connector, SessionSocket, SocketNotice, TaggedEvent};

/// A voice session: one duplex connection, one capture device and one
/// playback queue, behind a single integration surface.
///
/// Must be created inside a Tokio runtime. Transport events are processed by
/// a dispatch task in arrival order.
pub struct VoiceSession {
    config: SessionConfig,
    shared: Arc<Shared>,
    capture: CaptureController,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the session handle and its dispatch task
struct Shared {
    session_id: String,
    socket: Mutex<SessionSocket>,
    playback: Mutex<PlaybackCoordinator>,
    playback_ready: Notify,
    events: Arc<EventBus>,
    counters: SessionCounters,
    connected_since: Mutex<Option<DateTime<Utc>>>,
}

impl SegmentSink for Shared {
    fn submit(&self, segment: AudioSegment) -> Result<bool, SessionError> {
        let message = SegmentEncoder::encode(&segment)?;

        let sent = lock_or_recover(&self.socket).send(&message);
        if sent {
            SessionCounters::bump(&self.counters.segments_sent);
        } else {
            SessionCounters::bump(&self.counters.segments_dropped);
        }

        Ok(sent)
    }
}

impl Shared {
    /// Publish the outcome of a socket transition
    fn route(&self, notice: SocketNotice, capture: &CaptureController) {
        match notice {
            SocketNotice::Status(state) => {
                match state {
                    ConnectionState::Connected => {
                        *lock_or_recover(&self.connected_since) = Some(Utc::now());
                    }
                    ConnectionState::Disconnected => {
                        *lock_or_recover(&self.connected_since) = None;
                        self.playback_ready.notify_waiters();
                        // Connection loss cancels the recording in progress now,
                        // not one started after a quick reconnect
                        let attempt = capture.attempt();
                        let capture = capture.clone();
                        tokio::spawn(async move {
                            capture.abort_attempt(attempt).await;
                        });
                    }
                    ConnectionState::Connecting => {}
                }
                self.events.status(state);
            }

            SocketNotice::Inbound(InboundEvent::AudioReply(reply)) => {
                let queued = lock_or_recover(&self.playback).enqueue(reply);
                match queued {
                    Ok(item) => {
                        SessionCounters::bump(&self.counters.replies_received);
                        self.playback_ready.notify_one();
                        self.events.audio_received(&item);
                    }
                    Err(e) => {
                        debug!("Dropping audio reply: {}", e);
                        SessionCounters::bump(&self.counters.malformed_frames);
                    }
                }
            }

            SocketNotice::Inbound(InboundEvent::Interrupt) => {
                lock_or_recover(&self.playback).interrupt();
                SessionCounters::bump(&self.counters.interrupts);
                self.events.interrupted();
            }

            SocketNotice::Error(e) => {
                error!("Session {}: {}", self.session_id, e);
                self.events.error(&e);
            }

            SocketNotice::Dropped(_) => {
                SessionCounters::bump(&self.counters.malformed_frames);
            }
        }
    }
}

impl VoiceSession {
    /// Create a session that will connect through `connector` and record from `audio`
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        audio: Box<dyn AudioBackend>,
    ) -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .context("VoiceSession must be created inside a Tokio runtime")?;

        let endpoint = config.endpoint()?;
        info!("Creating voice session {} for {}", config.session_id, endpoint);

        let (socket, events_rx) = SessionSocket::new(endpoint, connector);
        let events = Arc::new(EventBus::new());

        let shared = Arc::new(Shared {
            session_id: config.session_id.clone(),
            socket: Mutex::new(socket),
            playback: Mutex::new(PlaybackCoordinator::new()),
            playback_ready: Notify::new(),
            events: Arc::clone(&events),
            counters: SessionCounters::default(),
            connected_since: Mutex::new(None),
        });

        let sink: Arc<dyn SegmentSink> = shared.clone();
        let capture = CaptureController::new(audio, sink, events, config.capture_settings());

        let dispatch_task = tokio::spawn(dispatch(Arc::clone(&shared), capture.clone(), events_rx));

        Ok(Self {
            config,
            shared,
            capture,
            dispatch_task: Mutex::new(Some(dispatch_task)),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    // ------------------------------------------------------------------
    // Connection control
    // ------------------------------------------------------------------

    /// Open the connection. No-op while connected or connecting.
    ///
    /// The `connecting` status is published by the dispatch task, before any
    /// status of the new connection.
    pub fn connect(&self) {
        lock_or_recover(&self.shared.socket).connect();
    }

    /// Close the connection. No-op while disconnected.
    pub fn disconnect(&self) {
        lock_or_recover(&self.shared.socket).disconnect();
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock_or_recover(&self.shared.socket).state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connection_state() == ConnectionState::Connecting
    }

    /// Encode and send a segment captured outside the controller.
    ///
    /// Returns `Ok(false)` when the segment was dropped because the session is
    /// not connected.
    pub fn send_audio_segment(&self, audio: Vec<u8>, image: Option<Vec<u8>>) -> Result<bool, SessionError> {
        self.shared.submit(AudioSegment::new(audio, image))
    }

    // ------------------------------------------------------------------
    // Recording
    // ------------------------------------------------------------------

    pub async fn toggle_recording(&self) -> Result<ToggleOutcome, SessionError> {
        self.capture.toggle_recording().await
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.capture.start_recording().await
    }

    pub async fn stop_recording(&self) -> Result<SegmentReport, SessionError> {
        self.capture.stop_recording().await
    }

    pub fn attach_camera(&self, camera: Arc<dyn FrameSource>) {
        self.capture.attach_camera(camera);
    }

    pub fn detach_camera(&self) {
        self.capture.detach_camera();
    }

    pub fn recording_state(&self) -> RecordingState {
        self.capture.state()
    }

    pub fn audio_level(&self) -> f32 {
        self.capture.audio_level()
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Take the next reply to play, if any
    pub fn next_playback(&self) -> Option<PlaybackItem> {
        lock_or_recover(&self.shared.playback).next()
    }

    /// Wait until a reply is available and take it.
    ///
    /// Returns `None` once the queue is empty and the session is disconnected,
    /// so a lost connection never leaves a consumer waiting.
    pub async fn wait_playback(&self) -> Option<PlaybackItem> {
        loop {
            // Register before checking so a wakeup between the checks is not lost
            let notified = self.shared.playback_ready.notified();

            if let Some(item) = self.next_playback() {
                return Some(item);
            }
            if self.connection_state() == ConnectionState::Disconnected {
                return None;
            }

            notified.await;
        }
    }

    /// Report that playback of `sequence` completed.
    /// Returns `false` if it was already stopped by an interrupt.
    pub fn finish_playback(&self, sequence: u64) -> bool {
        lock_or_recover(&self.shared.playback).finish(sequence)
    }

    pub fn pending_playback(&self) -> usize {
        lock_or_recover(&self.shared.playback).pending()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on_audio_received(&self, f: impl Fn(&PlaybackItem) + Send + Sync + 'static) -> SubscriptionId {
        self.shared.events.on_audio_received(f)
    }

    pub fn on_interrupt(&self, f: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.shared.events.on_interrupt(f)
    }

    pub fn on_error(&self, f: impl Fn(&SessionError) + Send + Sync + 'static) -> SubscriptionId {
        self.shared.events.on_error(f)
    }

    pub fn on_status_change(&self, f: impl Fn(ConnectionState) + Send + Sync + 'static) -> SubscriptionId {
        self.shared.events.on_status_change(f)
    }

    pub fn on_recording_state_change(
        &self,
        f: impl Fn(RecordingState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.events.on_recording_state_change(f)
    }

    pub fn on_audio_level(&self, f: impl Fn(f32) + Send + Sync + 'static) -> SubscriptionId {
        self.shared.events.on_audio_level(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        let counters = &self.shared.counters;

        SessionStats {
            session_id: self.config.session_id.clone(),
            connection: self.connection_state(),
            recording: self.recording_state(),
            connected_since: *lock_or_recover(&self.shared.connected_since),
            segments_sent: SessionCounters::read(&counters.segments_sent),
            segments_dropped: SessionCounters::read(&counters.segments_dropped),
            replies_received: SessionCounters::read(&counters.replies_received),
            interrupts: SessionCounters::read(&counters.interrupts),
            malformed_frames: SessionCounters::read(&counters.malformed_frames),
            pending_playback: self.pending_playback(),
        }
    }

    /// Close the connection, cancel capture and stop event dispatch.
    ///
    /// Events still in flight after this call are not published.
    pub async fn shutdown(&self) {
        info!("Shutting down voice session {}", self.config.session_id);

        self.disconnect();
        self.capture.abort().await;

        let task = lock_or_recover(&self.dispatch_task).take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(task) = lock_or_recover(&self.dispatch_task).take() {
            task.abort();
        }
    }
}

/// Feed transport events through the socket state machine, one at a time
async fn dispatch(
    shared: Arc<Shared>,
    capture: CaptureController,
    mut events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
) {
    debug!("Event dispatch started for session {}", shared.session_id);

    while let Some((generation, event)) = events_rx.recv().await {
        let notice = lock_or_recover(&shared.socket).handle_event(generation, event);
        if let Some(notice) = notice {
            shared.route(notice, &capture);
        }
    }

    debug!("Event dispatch stopped for session {}", shared.session_id);
}
