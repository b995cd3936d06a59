use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::SegmentFormat;
use crate::session::{SessionConfig, DEFAULT_ENDPOINT_PATH};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. "ws://localhost:8000"
    pub url: String,
    #[serde(default = "default_endpoint_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u64,
    #[serde(default)]
    pub segment_format: SegmentFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct CameraConfig {
    /// Image file served as the camera still, if any
    pub image_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    /// Directory replies are written to
    pub output_dir: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            output_dir: "replies".to_string(),
        }
    }
}

fn default_endpoint_path() -> String {
    DEFAULT_ENDPOINT_PATH.to_string()
}

impl Config {
    /// Load from a config file (extension optional) with `TALKMATE__*` env overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TALKMATE").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Session settings derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            server_url: self.server.url.clone(),
            endpoint_path: self.server.path.clone(),
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            frame_duration_ms: self.audio.frame_duration_ms,
            segment_format: self.audio.segment_format,
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[service]
name = "talkmate"

[server]
url = "ws://backend:8000"

[audio]
sample_rate = 16000
channels = 1
frame_duration_ms = 50
segment_format = "wav"

[camera]
image_path = "snapshot.jpg"
"#
        )
        .unwrap();

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.service.name, "talkmate");
        assert_eq!(cfg.server.path, DEFAULT_ENDPOINT_PATH);
        assert_eq!(cfg.camera.image_path.as_deref(), Some("snapshot.jpg"));
        assert_eq!(cfg.playback.output_dir, "replies");

        let session = cfg.session_config();
        assert_eq!(session.segment_format, SegmentFormat::Wav);
        assert_eq!(session.frame_duration_ms, 50);
        assert_eq!(session.endpoint().unwrap(), "ws://backend:8000/ws/test-client");
    }
}
