use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate of the recorded segment
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Duration of each frame in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// Pace generated/file frames at wall-clock speed like a live device
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz speech
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms frames
            realtime: true,
        }
    }
}

impl AudioBackendConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.buffer_duration_ms.max(1))
    }
}

/// Audio capture backend trait
///
/// The session only consumes frames; how they are acquired is up to the backend:
/// - `WavFileBackend`: replay a WAV file
/// - `SilenceBackend`: generated silence of a fixed length
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::File(path) => Ok(Box::new(super::file_backend::WavFileBackend::new(path, config))),
            AudioSource::Silence(duration) => {
                Ok(Box::new(super::silence::SilenceBackend::new(duration, config)))
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Replay a WAV file as if it were captured live
    File(PathBuf),
    /// Generated silence of the given length
    Silence(Duration),
}

/// Background task feeding a fixed list of frames into a capture channel.
///
/// After the last frame the channel stays open, like a device that went
/// quiet, until `stop` is called.
pub(crate) struct FrameProducer {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FrameProducer {
    pub(crate) fn spawn(
        frames: Vec<AudioFrame>,
        frame_duration: Duration,
        realtime: bool,
    ) -> (Self, mpsc::Receiver<AudioFrame>) {
        let (tx, rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);

            for frame in frames {
                if realtime {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = &mut stop_rx => return,
                    }
                }

                tokio::select! {
                    sent = tx.send(frame) => {
                        if sent.is_err() {
                            debug!("Frame receiver dropped, producer exiting");
                            return;
                        }
                    }
                    _ = &mut stop_rx => return,
                }
            }

            // Out of frames: hold the stream open until stopped
            let _ = stop_rx.await;
        });

        (
            Self {
                stop_tx: Some(stop_tx),
                task: Some(task),
            },
            rx,
        )
    }

    pub(crate) async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Frame producer task panicked: {}", e);
            }
        }
    }
}
