use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::camera::FrameSource;
use super::state::RecordingState;
use crate::audio::{AudioBackend, AudioFrame, SegmentBuffer, SegmentFormat};
use crate::error::SessionError;
use crate::lock_or_recover;
use crate::protocol::AudioSegment;
use crate::session::EventBus;

/// Destination for finished segments (encoder + socket in a live session)
pub trait SegmentSink: Send + Sync {
    /// Encode and send one segment. `Ok(false)` means it was dropped because
    /// the session is not connected.
    fn submit(&self, segment: AudioSegment) -> Result<bool, SessionError>;
}

/// Shape of the audio blob produced per utterance
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SegmentFormat,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            format: SegmentFormat::Pcm,
        }
    }
}

/// Summary of one processed utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub audio_bytes: usize,
    pub duration_ms: u64,
    pub with_image: bool,
    /// Whether the segment was written to a connected socket
    pub sent: bool,
}

/// Result of [`CaptureController::toggle_recording`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped(SegmentReport),
    /// Toggle arrived while acquiring the device or processing a segment
    Ignored(RecordingState),
}

/// Drives the local recording state machine and owns the capture device.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct CaptureController {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<CaptureState>,
    /// Serializes transitions with their publication so subscribers see them in order
    transitions: Mutex<()>,
    device: tokio::sync::Mutex<Box<dyn AudioBackend>>,
    camera: Mutex<Option<Arc<dyn FrameSource>>>,
    sink: Arc<dyn SegmentSink>,
    events: Arc<EventBus>,
    settings: CaptureSettings,
    /// Latest frame energy as `f32` bits
    level: Arc<AtomicU32>,
}

struct CaptureState {
    recording: RecordingState,
    buffering: Option<BufferingTask>,
    /// Bumped per start attempt so an abort during acquisition is detected
    attempt: u64,
}

/// Task collecting frames from the device into the segment buffer
struct BufferingTask {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<SegmentBuffer>,
}

impl BufferingTask {
    fn spawn(
        mut audio_rx: mpsc::Receiver<AudioFrame>,
        settings: CaptureSettings,
        level: Arc<AtomicU32>,
        events: Arc<EventBus>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut buffer = SegmentBuffer::new(settings.format, settings.sample_rate, settings.channels);

            let mut stream_ended = false;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    frame = audio_rx.recv() => match frame {
                        Some(frame) => {
                            let frame_level = buffer.push(frame);
                            level.store(frame_level.to_bits(), Ordering::Relaxed);
                            events.audio_level(frame_level);
                        }
                        None => {
                            stream_ended = true;
                            break;
                        }
                    },
                }
            }

            if stream_ended {
                debug!("Audio stream ended before stop");
                // Keep the buffer until the controller asks for it
                let _ = stop_rx.await;
            }

            // Frames already delivered belong to this segment
            while let Ok(frame) = audio_rx.try_recv() {
                buffer.push(frame);
            }

            buffer
        });

        Self { stop_tx, task }
    }

    /// Stop collecting and hand back the buffered audio
    async fn finish(self) -> Option<SegmentBuffer> {
        let _ = self.stop_tx.send(());
        match self.task.await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                error!("Buffering task panicked: {}", e);
                None
            }
        }
    }
}

/// What an abort found when it took the state lock
enum AbortPlan {
    Nothing,
    CancelAcquisition,
    StopRecording(Option<BufferingTask>),
}

impl CaptureController {
    pub fn new(
        device: Box<dyn AudioBackend>,
        sink: Arc<dyn SegmentSink>,
        events: Arc<EventBus>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CaptureState {
                    recording: RecordingState::Idle,
                    buffering: None,
                    attempt: 0,
                }),
                transitions: Mutex::new(()),
                device: tokio::sync::Mutex::new(device),
                camera: Mutex::new(None),
                sink,
                events,
                settings,
                level: Arc::new(AtomicU32::new(0f32.to_bits())),
            }),
        }
    }

    pub fn state(&self) -> RecordingState {
        lock_or_recover(&self.inner.state).recording
    }

    /// Energy of the most recent captured frame (0.0 when not recording)
    pub fn audio_level(&self) -> f32 {
        f32::from_bits(self.inner.level.load(Ordering::Relaxed))
    }

    /// Attach a camera; one still is captured per segment while attached
    pub fn attach_camera(&self, camera: Arc<dyn FrameSource>) {
        info!("Camera attached: {}", camera.name());
        *lock_or_recover(&self.inner.camera) = Some(camera);
    }

    pub fn detach_camera(&self) {
        if lock_or_recover(&self.inner.camera).take().is_some() {
            info!("Camera detached");
        }
    }

    pub fn has_camera(&self) -> bool {
        lock_or_recover(&self.inner.camera).is_some()
    }

    /// Start or stop recording depending on the current state
    pub async fn toggle_recording(&self) -> Result<ToggleOutcome, SessionError> {
        match self.state() {
            RecordingState::Idle => {
                self.start_recording().await?;
                Ok(ToggleOutcome::Started)
            }
            RecordingState::Recording => Ok(ToggleOutcome::Stopped(self.stop_recording().await?)),
            state => {
                debug!("Toggle ignored while {}", state);
                Ok(ToggleOutcome::Ignored(state))
            }
        }
    }

    /// Acquire the audio device and begin buffering. Legal only from `idle`.
    pub async fn start_recording(&self) -> Result<(), SessionError> {
        let attempt = self.begin_start()?;

        let mut device = self.inner.device.lock().await;
        debug!("Acquiring audio device: {}", device.name());

        let audio_rx = match device.start().await {
            Ok(rx) => rx,
            Err(e) => {
                drop(device);
                warn!("Could not access audio device: {:#}", e);
                self.fail_start(attempt);

                let err = SessionError::DeviceAccess(format!("{:#}", e));
                self.inner.events.error(&err);
                return Err(err);
            }
        };

        if !self.commit_start(attempt, audio_rx) {
            info!("Recording cancelled during device acquisition");
            if let Err(e) = device.stop().await {
                warn!("Failed to release audio device: {:#}", e);
            }
            return Ok(());
        }

        info!("Recording started ({})", device.name());
        Ok(())
    }

    /// Finish the utterance and send it. Legal only from `recording`.
    ///
    /// The controller reports `processing` immediately and returns to `idle`
    /// after the segment has been submitted and the device released.
    pub async fn stop_recording(&self) -> Result<SegmentReport, SessionError> {
        let buffering = self.begin_stop()?;
        info!("Recording stopped, processing segment");

        // Finalize buffered audio into one blob
        let buffer = match buffering {
            Some(task) => task.finish().await,
            None => None,
        };
        let (audio, duration_ms) = match buffer {
            Some(buffer) => {
                let duration_ms = buffer.duration_ms();
                match buffer.finalize() {
                    Ok(audio) => (audio, duration_ms),
                    Err(e) => {
                        error!("Failed to finalize audio segment: {:#}", e);
                        (Vec::new(), 0)
                    }
                }
            }
            None => (Vec::new(), 0),
        };

        // One still frame if a camera is attached; failure falls back to audio only
        let camera = lock_or_recover(&self.inner.camera).clone();
        let image = match camera {
            Some(camera) => match camera.capture_still().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Still capture from {} failed, sending audio only: {:#}", camera.name(), e);
                    None
                }
            },
            None => None,
        };

        let audio_bytes = audio.len();
        let with_image = image.is_some();
        let submitted = self.inner.sink.submit(AudioSegment::new(audio, image));

        match &submitted {
            Ok(true) => info!(
                "Sent segment: {} bytes, {}ms{}",
                audio_bytes,
                duration_ms,
                if with_image { ", with camera frame" } else { "" }
            ),
            Ok(false) => warn!("Segment dropped: session not connected"),
            Err(e) => warn!("Segment not sent: {}", e),
        }

        self.release_device().await;
        self.finish_stop();

        submitted.map(|sent| SegmentReport {
            audio_bytes,
            duration_ms,
            with_image,
            sent,
        })
    }

    /// Cancel an active recording without sending it.
    ///
    /// Used when the connection is lost. A segment already processing runs to
    /// completion; an acquisition in flight is cancelled.
    pub async fn abort(&self) {
        self.abort_where(None).await;
    }

    /// Start attempt counter, bumped by every `start_recording` and by an
    /// abort during acquisition. Pass it to [`abort_attempt`](Self::abort_attempt).
    pub fn attempt(&self) -> u64 {
        lock_or_recover(&self.inner.state).attempt
    }

    /// Like [`abort`](Self::abort), but a no-op once a newer recording has
    /// been started since `attempt` was read.
    pub async fn abort_attempt(&self, attempt: u64) {
        self.abort_where(Some(attempt)).await;
    }

    async fn abort_where(&self, attempt: Option<u64>) {
        // Holding the device keeps a new recording from starting until it is released
        let mut device = self.inner.device.lock().await;

        match self.begin_abort(attempt) {
            AbortPlan::Nothing => {}
            AbortPlan::CancelAcquisition => {
                info!("Recording aborted during device acquisition");
            }
            AbortPlan::StopRecording(buffering) => {
                if let Some(task) = buffering {
                    let discarded = task.finish().await.map(|b| b.frame_count()).unwrap_or(0);
                    debug!("Discarded {} buffered frames", discarded);
                }
                if let Err(e) = device.stop().await {
                    warn!("Failed to release audio device: {:#}", e);
                }
                self.reset_level();
                info!("Recording aborted");
            }
        }
    }

    async fn release_device(&self) {
        {
            let mut device = self.inner.device.lock().await;
            if let Err(e) = device.stop().await {
                warn!("Failed to release audio device: {:#}", e);
            }
        }
        self.reset_level();
    }

    fn reset_level(&self) {
        self.inner.level.store(0f32.to_bits(), Ordering::Relaxed);
        self.inner.events.audio_level(0.0);
    }

    fn publish(&self, state: RecordingState) {
        debug!("Recording state: {}", state);
        self.inner.events.recording_state(state);
    }

    fn begin_start(&self) -> Result<u64, SessionError> {
        let mut state = lock_or_recover(&self.inner.state);
        if state.recording != RecordingState::Idle {
            return Err(SessionError::InvalidTransition {
                action: "start recording",
                state: state.recording,
            });
        }

        state.recording = RecordingState::Listening;
        state.attempt += 1;
        Ok(state.attempt)
    }

    fn fail_start(&self, attempt: u64) {
        let mut state = lock_or_recover(&self.inner.state);
        if state.recording == RecordingState::Listening && state.attempt == attempt {
            state.recording = RecordingState::Idle;
        }
    }

    fn commit_start(&self, attempt: u64, audio_rx: mpsc::Receiver<AudioFrame>) -> bool {
        let _order = lock_or_recover(&self.inner.transitions);
        {
            let mut state = lock_or_recover(&self.inner.state);
            if state.recording != RecordingState::Listening || state.attempt != attempt {
                return false;
            }

            state.recording = RecordingState::Recording;
            state.buffering = Some(BufferingTask::spawn(
                audio_rx,
                self.inner.settings,
                Arc::clone(&self.inner.level),
                Arc::clone(&self.inner.events),
            ));
        }
        self.publish(RecordingState::Recording);
        true
    }

    fn begin_stop(&self) -> Result<Option<BufferingTask>, SessionError> {
        let _order = lock_or_recover(&self.inner.transitions);
        let buffering = {
            let mut state = lock_or_recover(&self.inner.state);
            if state.recording != RecordingState::Recording {
                return Err(SessionError::InvalidTransition {
                    action: "stop recording",
                    state: state.recording,
                });
            }

            state.recording = RecordingState::Processing;
            state.buffering.take()
        };
        self.publish(RecordingState::Processing);
        Ok(buffering)
    }

    fn finish_stop(&self) {
        let _order = lock_or_recover(&self.inner.transitions);
        lock_or_recover(&self.inner.state).recording = RecordingState::Idle;
        self.publish(RecordingState::Idle);
    }

    fn begin_abort(&self, attempt: Option<u64>) -> AbortPlan {
        let _order = lock_or_recover(&self.inner.transitions);
        let plan = {
            let mut state = lock_or_recover(&self.inner.state);
            if attempt.is_some_and(|attempt| attempt != state.attempt) {
                debug!("Abort skipped: recording #{} has started since", state.attempt);
                return AbortPlan::Nothing;
            }
            match state.recording {
                RecordingState::Listening => {
                    state.recording = RecordingState::Idle;
                    state.attempt += 1;
                    AbortPlan::CancelAcquisition
                }
                RecordingState::Recording => {
                    state.recording = RecordingState::Idle;
                    AbortPlan::StopRecording(state.buffering.take())
                }
                RecordingState::Idle | RecordingState::Processing => AbortPlan::Nothing,
            }
        };

        if matches!(plan, AbortPlan::StopRecording(_)) {
            self.publish(RecordingState::Idle);
        }
        plan
    }
}
