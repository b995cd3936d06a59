use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, FrameProducer};

/// Backend producing a fixed stretch of digital silence
pub struct SilenceBackend {
    duration: Duration,
    config: AudioBackendConfig,
    producer: Option<FrameProducer>,
}

impl SilenceBackend {
    pub fn new(duration: Duration, config: AudioBackendConfig) -> Self {
        Self {
            duration,
            config,
            producer: None,
        }
    }

    fn frames(&self) -> Vec<AudioFrame> {
        let frame_ms = self.config.buffer_duration_ms.max(1);
        let samples_per_frame = (self.config.target_sample_rate as u64
            * self.config.target_channels as u64
            * frame_ms
            / 1000) as usize;
        let count = (self.duration.as_millis() as u64).div_ceil(frame_ms);

        (0..count)
            .map(|i| AudioFrame {
                samples: vec![0i16; samples_per_frame],
                sample_rate: self.config.target_sample_rate,
                channels: self.config.target_channels,
                timestamp_ms: i * frame_ms,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl AudioBackend for SilenceBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.producer.is_some() {
            bail!("Already capturing");
        }

        let frames = self.frames();
        info!(
            "Generating {:.1}s of silence ({} frames)",
            self.duration.as_secs_f64(),
            frames.len()
        );

        let (producer, rx) =
            FrameProducer::spawn(frames, self.config.frame_duration(), self.config.realtime);
        self.producer = Some(producer);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(mut producer) = self.producer.take() {
            producer.stop().await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.producer.is_some()
    }

    fn name(&self) -> &str {
        "silence"
    }
}
