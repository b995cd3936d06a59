// WAV file audio backend: replays a recording as if it came from a microphone

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, FrameProducer};
use super::convert::supports_conversion;
use super::file::AudioFile;

pub struct WavFileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    producer: Option<FrameProducer>,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            producer: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.producer.is_some() {
            bail!("Already capturing");
        }

        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .context("WAV reader task panicked")??;

        if !supports_conversion(
            file.sample_rate,
            file.channels,
            self.config.target_sample_rate,
            self.config.target_channels,
        ) {
            bail!(
                "Cannot convert {} ({}Hz, {} channels) to {}Hz, {} channels",
                file.path,
                file.sample_rate,
                file.channels,
                self.config.target_sample_rate,
                self.config.target_channels
            );
        }

        let frames = file.frames(self.config.buffer_duration_ms);
        info!(
            "Replaying {} ({} frames of {}ms)",
            file.path,
            frames.len(),
            self.config.buffer_duration_ms
        );

        let (producer, rx) =
            FrameProducer::spawn(frames, self.config.frame_duration(), self.config.realtime);
        self.producer = Some(producer);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(mut producer) = self.producer.take() {
            producer.stop().await;
            info!("WAV replay stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.producer.is_some()
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}
