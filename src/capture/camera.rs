use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::debug;

/// Producer of single still frames (encoded image bytes)
#[async_trait::async_trait]
pub trait FrameSource: Send + Sync {
    /// Capture exactly one still frame
    async fn capture_still(&self) -> Result<Vec<u8>>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Serves the contents of an image file as the camera still
pub struct StillImageFile {
    path: PathBuf,
}

impl StillImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl FrameSource for StillImageFile {
    async fn capture_still(&self) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read still image: {}", self.path.display()))?;

        if bytes.is_empty() {
            bail!("Still image {} is empty", self.path.display());
        }

        debug!("Captured still from {} ({} bytes)", self.path.display(), bytes.len());
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "image file"
    }
}
