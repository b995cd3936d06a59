// Integration tests for the capture controller
//
// A recording sink stands in for the socket so segments can be inspected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use talkmate_client::{
    AudioBackend, AudioBackendConfig, AudioFrame, AudioSegment, CaptureController, CaptureSettings,
    EventBus, FrameSource, RecordingState, SegmentSink, SessionError, SilenceBackend, ToggleOutcome,
};
use tokio::sync::{mpsc, Notify};

/// Sink that records every submitted segment
#[derive(Default)]
struct RecordingSink {
    segments: Mutex<Vec<AudioSegment>>,
    disconnected: AtomicBool,
}

impl SegmentSink for RecordingSink {
    fn submit(&self, segment: AudioSegment) -> Result<bool, SessionError> {
        if segment.audio.is_empty() {
            return Err(SessionError::EmptySegment);
        }
        if self.disconnected.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.segments.lock().unwrap().push(segment);
        Ok(true)
    }
}

/// Device that refuses to open
struct DeniedDevice;

#[async_trait]
impl AudioBackend for DeniedDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        bail!("permission denied")
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "denied"
    }
}

struct FixedStill(Vec<u8>);

#[async_trait]
impl FrameSource for FixedStill {
    async fn capture_still(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct BrokenCamera;

#[async_trait]
impl FrameSource for BrokenCamera {
    async fn capture_still(&self) -> Result<Vec<u8>> {
        bail!("camera unplugged")
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Camera that holds the controller in `processing` until released
#[derive(Default)]
struct GatedCamera {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl FrameSource for GatedCamera {
    async fn capture_still(&self) -> Result<Vec<u8>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![0xFF, 0xD8])
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Device whose acquisition holds the controller in `listening` until released
struct GatedDevice {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    stream: Option<mpsc::Sender<AudioFrame>>,
}

#[async_trait]
impl AudioBackend for GatedDevice {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        self.entered.notify_one();
        self.release.notified().await;
        let (tx, rx) = mpsc::channel(8);
        self.stream = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "gated"
    }
}

fn silence(secs: u64) -> Box<dyn AudioBackend> {
    let config = AudioBackendConfig {
        realtime: false,
        ..AudioBackendConfig::default()
    };
    Box::new(SilenceBackend::new(Duration::from_secs(secs), config))
}

fn controller(device: Box<dyn AudioBackend>) -> (CaptureController, Arc<RecordingSink>, Arc<EventBus>) {
    let sink = Arc::new(RecordingSink::default());
    let events = Arc::new(EventBus::new());
    let controller = CaptureController::new(device, sink.clone(), events.clone(), CaptureSettings::default());
    (controller, sink, events)
}

/// Start, let the backend deliver its frames, stop
async fn record_once(controller: &CaptureController) -> Result<ToggleOutcome, SessionError> {
    assert_eq!(controller.toggle_recording().await?, ToggleOutcome::Started);
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.toggle_recording().await
}

#[tokio::test]
async fn test_denied_device_returns_to_idle() {
    let (controller, sink, events) = controller(Box::new(DeniedDevice));

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    events.on_error(move |e| seen.lock().unwrap().push(e.to_string()));

    let result = controller.start_recording().await;

    assert!(matches!(result, Err(SessionError::DeviceAccess(_))));
    assert_eq!(controller.state(), RecordingState::Idle);
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(sink.segments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_recording_publishes_state_path() -> Result<()> {
    let (controller, _sink, events) = controller(silence(1));

    let states = Arc::new(Mutex::new(Vec::new()));
    let seen = states.clone();
    events.on_recording_state_change(move |s| seen.lock().unwrap().push(s));

    record_once(&controller).await?;

    assert_eq!(
        *states.lock().unwrap(),
        vec![RecordingState::Recording, RecordingState::Processing, RecordingState::Idle]
    );
    assert_eq!(controller.state(), RecordingState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_two_seconds_of_silence_without_camera() -> Result<()> {
    let (controller, sink, _events) = controller(silence(2));

    let outcome = record_once(&controller).await?;

    match outcome {
        ToggleOutcome::Stopped(report) => {
            // 2s of 16kHz mono 16-bit PCM
            assert_eq!(report.audio_bytes, 64_000);
            assert_eq!(report.duration_ms, 2000);
            assert!(!report.with_image);
            assert!(report.sent);
        }
        other => panic!("Expected a stopped segment, got {:?}", other),
    }

    let segments = sink.segments.lock().unwrap();
    assert_eq!(segments.len(), 1);
    assert!(segments[0].image.is_none());
    assert!(segments[0].audio.iter().all(|b| *b == 0));

    Ok(())
}

#[tokio::test]
async fn test_camera_still_attached_to_segment() -> Result<()> {
    let (controller, sink, _events) = controller(silence(1));
    controller.attach_camera(Arc::new(FixedStill(vec![0xFF, 0xD8])));

    record_once(&controller).await?;

    let segments = sink.segments.lock().unwrap();
    assert_eq!(segments[0].image.as_deref(), Some(&[0xFF, 0xD8][..]));

    Ok(())
}

#[tokio::test]
async fn test_camera_failure_falls_back_to_audio_only() -> Result<()> {
    let (controller, sink, _events) = controller(silence(1));
    controller.attach_camera(Arc::new(BrokenCamera));

    match record_once(&controller).await? {
        ToggleOutcome::Stopped(report) => {
            assert!(!report.with_image);
            assert!(report.sent);
        }
        other => panic!("Expected a stopped segment, got {:?}", other),
    }

    assert_eq!(sink.segments.lock().unwrap().len(), 1);
    assert_eq!(controller.state(), RecordingState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_segment_dropped_when_not_connected() -> Result<()> {
    let (controller, sink, _events) = controller(silence(1));
    sink.disconnected.store(true, Ordering::SeqCst);

    match record_once(&controller).await? {
        ToggleOutcome::Stopped(report) => assert!(!report.sent),
        other => panic!("Expected a stopped segment, got {:?}", other),
    }
    assert_eq!(controller.state(), RecordingState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_is_rejected() {
    let (controller, _sink, _events) = controller(silence(1));

    let result = controller.stop_recording().await;
    assert!(matches!(
        result,
        Err(SessionError::InvalidTransition { state: RecordingState::Idle, .. })
    ));
}

#[tokio::test]
async fn test_abort_discards_recording() -> Result<()> {
    let (controller, sink, _events) = controller(silence(1));

    controller.start_recording().await?;
    assert_eq!(controller.state(), RecordingState::Recording);

    controller.abort().await;
    assert_eq!(controller.state(), RecordingState::Idle);
    assert!(sink.segments.lock().unwrap().is_empty());

    // Device was released, so a new recording can start
    controller.start_recording().await?;
    assert_eq!(controller.state(), RecordingState::Recording);

    Ok(())
}

#[tokio::test]
async fn test_no_new_recording_while_processing() -> Result<()> {
    let (controller, sink, _events) = controller(silence(1));
    let camera = Arc::new(GatedCamera::default());
    controller.attach_camera(camera.clone());

    controller.start_recording().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopping = tokio::spawn({
        let controller = controller.clone();
        async move { controller.stop_recording().await }
    });
    camera.entered.notified().await;
    assert_eq!(controller.state(), RecordingState::Processing);

    let refused = controller.start_recording().await;
    assert!(matches!(
        refused,
        Err(SessionError::InvalidTransition { state: RecordingState::Processing, .. })
    ));
    assert_eq!(
        controller.toggle_recording().await?,
        ToggleOutcome::Ignored(RecordingState::Processing)
    );

    camera.release.notify_one();
    let report = stopping.await??;
    assert!(report.with_image);
    assert_eq!(controller.state(), RecordingState::Idle);
    assert_eq!(sink.segments.lock().unwrap().len(), 1, "Exactly one segment in flight");

    Ok(())
}

#[tokio::test]
async fn test_no_new_recording_while_listening() -> Result<()> {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let device = GatedDevice {
        entered: entered.clone(),
        release: release.clone(),
        stream: None,
    };
    let (controller, _sink, _events) = controller(Box::new(device));

    let starting = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start_recording().await }
    });
    entered.notified().await;
    assert_eq!(controller.state(), RecordingState::Listening);

    let refused = controller.start_recording().await;
    assert!(matches!(
        refused,
        Err(SessionError::InvalidTransition { state: RecordingState::Listening, .. })
    ));
    assert_eq!(
        controller.toggle_recording().await?,
        ToggleOutcome::Ignored(RecordingState::Listening)
    );

    release.notify_one();
    starting.await??;
    assert_eq!(controller.state(), RecordingState::Recording);

    controller.abort().await;
    assert_eq!(controller.state(), RecordingState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_published_transitions_follow_the_state_machine() -> Result<()> {
    let (controller, _sink, events) = controller(silence(1));

    let states = Arc::new(Mutex::new(Vec::new()));
    let seen = states.clone();
    events.on_recording_state_change(move |s| seen.lock().unwrap().push(s));

    record_once(&controller).await?;
    controller.start_recording().await?;
    controller.abort().await;
    assert!(controller.stop_recording().await.is_err());
    controller.toggle_recording().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.stop_recording().await?;
    controller.abort().await;

    let states = states.lock().unwrap();
    assert_eq!(states.len(), 8);
    let mut previous = RecordingState::Idle;
    for &state in states.iter() {
        assert!(
            previous.can_transition_to(state),
            "Illegal transition {} -> {}",
            previous,
            state
        );
        previous = state;
    }
    assert_eq!(previous, RecordingState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_stale_abort_leaves_new_recording_alone() -> Result<()> {
    let (controller, _sink, _events) = controller(silence(1));

    // Connection lost while idle
    let lost_at = controller.attempt();

    // Reconnect and start before the abort gets to run
    controller.start_recording().await?;
    controller.abort_attempt(lost_at).await;
    assert_eq!(controller.state(), RecordingState::Recording);

    // An abort for the current attempt still cancels it
    controller.abort_attempt(controller.attempt()).await;
    assert_eq!(controller.state(), RecordingState::Idle);

    Ok(())
}
