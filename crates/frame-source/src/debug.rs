//! Optional debug persistence of captured frames

use std::path::{Path, PathBuf};

use image::ColorType;
use tracing::debug;

use crate::{errors::CaptureError, models::Frame};

/// Writes a debug copy of a frame somewhere durable.
pub trait DebugImageSink: Send + Sync {
    fn persist(&self, frame: &Frame) -> Result<PathBuf, CaptureError>;
}

/// Saves frames as PNG files named after their capture time.
pub struct PngDirectorySink {
    dir: PathBuf,
}

impl PngDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(frame: &Frame) -> String {
        format!(
            "frame_{}.png",
            frame.captured_at().format("%Y%m%d_%H%M%S_%3f")
        )
    }
}

impl DebugImageSink for PngDirectorySink {
    fn persist(&self, frame: &Frame) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| CaptureError::Persist(format!("{}: {}", self.dir.display(), err)))?;
        let path = self.dir.join(Self::file_name(frame));
        image::save_buffer(
            &path,
            frame.pixels(),
            frame.width(),
            frame.height(),
            ColorType::Rgb8,
        )
        .map_err(|err| CaptureError::Persist(format!("{}: {}", path.display(), err)))?;
        debug!(path = %path.display(), frame_id = %frame.id(), "debug image saved");
        Ok(path)
    }
}
