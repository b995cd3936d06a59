use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::audio::{AudioBackendConfig, SegmentFormat};
use crate::capture::CaptureSettings;

/// Fixed path the backend serves the voice socket on
pub const DEFAULT_ENDPOINT_PATH: &str = "/ws/test-client";

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier, used in logs and stats
    pub session_id: String,

    /// Base URL of the backend (e.g., "ws://localhost:8000")
    pub server_url: String,

    /// Socket path joined onto `server_url`
    pub endpoint_path: String,

    /// Sample rate of recorded segments
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Capture frame duration in milliseconds
    pub frame_duration_ms: u64,

    /// Container of the recorded audio blob
    pub segment_format: SegmentFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            server_url: "ws://localhost:8000".to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            sample_rate: 16000,     // 16kHz speech
            channels: 1,            // Mono
            frame_duration_ms: 100, // 100ms frames
            segment_format: SegmentFormat::Pcm,
        }
    }
}

impl SessionConfig {
    /// Full WebSocket URL of the voice endpoint
    pub fn endpoint(&self) -> Result<String> {
        let base = Url::parse(&self.server_url)
            .with_context(|| format!("Invalid server URL: {}", self.server_url))?;

        if !matches!(base.scheme(), "ws" | "wss") {
            bail!("Server URL must use ws:// or wss://, got {}", self.server_url);
        }

        let endpoint = base
            .join(&self.endpoint_path)
            .with_context(|| format!("Invalid endpoint path: {}", self.endpoint_path))?;

        Ok(endpoint.to_string())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.segment_format,
        }
    }

    /// Backend configuration matching this session's audio shape
    pub fn backend_config(&self, realtime: bool) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.sample_rate,
            target_channels: self.channels,
            buffer_duration_ms: self.frame_duration_ms,
            realtime,
        }
    }
}
