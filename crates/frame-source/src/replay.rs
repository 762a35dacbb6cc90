//! Directory replay capture surface
//!
//! Stands in for a platform screen: image files in a directory are handed
//! out one per interval, in file-name order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

use crate::{
    errors::CaptureError,
    models::{PixelFormat, RawBuffer},
    surface::CaptureSurface,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct DirectoryReplaySurface {
    files: Vec<PathBuf>,
    cursor: AtomicUsize,
    period: Duration,
    looping: bool,
    ticker: Mutex<Option<Interval>>,
}

impl DirectoryReplaySurface {
    /// Collect the replayable images of `dir`.
    pub fn open(dir: &Path, period: Duration, looping: bool) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|err| {
            CaptureError::SurfaceUnavailable(format!("{}: {}", dir.display(), err))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CaptureError::SurfaceUnavailable(format!(
                "no replayable images in {}",
                dir.display()
            )));
        }
        debug!(count = files.len(), dir = %dir.display(), "replay surface opened");

        Ok(Self {
            files,
            cursor: AtomicUsize::new(0),
            period: period.max(Duration::from_millis(1)),
            looping,
            ticker: Mutex::new(None),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Restart replay from the first file.
    pub fn rewind(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    fn exhausted(&self) -> bool {
        !self.looping && self.cursor.load(Ordering::SeqCst) >= self.files.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl CaptureSurface for DirectoryReplaySurface {
    async fn wait_ready(&self) -> Result<(), CaptureError> {
        if self.exhausted() {
            return Err(CaptureError::SurfaceUnavailable(
                "replay directory exhausted".to_string(),
            ));
        }
        let mut guard = self.ticker.lock().await;
        let ticker = guard.get_or_insert_with(|| {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
        Ok(())
    }

    fn acquire_latest(&self) -> Result<Option<RawBuffer>, CaptureError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if !self.looping && index >= self.files.len() {
            return Ok(None);
        }
        let path = &self.files[index % self.files.len()];
        let image = image::open(path)
            .map_err(|err| CaptureError::Transient(format!("{}: {}", path.display(), err)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Some(RawBuffer::packed(
            width,
            height,
            PixelFormat::Rgba8888,
            image.into_raw(),
        )))
    }
}
