use std::path::PathBuf;

use async_trait::async_trait;
use chromaclick_types::{frame::Frame, Result};
use tracing::info;

use crate::{capture_error, FrameSource};

/// Reads each capture from an image file on disk.
pub struct StillImageSource {
    path: PathBuf,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for StillImageSource {
    async fn capture_frame(&self) -> Result<Frame> {
        let path = self.path.clone();
        info!("Loading still frame from {}", path.display());
        tokio::task::spawn_blocking(move || Frame::load(path))
            .await
            .map_err(|err| capture_error(format!("frame loader task failed: {err}")))?
    }
}
