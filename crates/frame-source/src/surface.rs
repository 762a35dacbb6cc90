//! Capture surface abstraction

use async_trait::async_trait;

use crate::{errors::CaptureError, models::RawBuffer};

/// Platform screen capture, adapted into frames by `FrameSource`.
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Resolve once a new buffer is ready to be acquired.
    ///
    /// Returns `SurfaceUnavailable` when the surface has closed for good.
    async fn wait_ready(&self) -> Result<(), CaptureError>;

    /// Pull the most recent buffer, if any.
    fn acquire_latest(&self) -> Result<Option<RawBuffer>, CaptureError>;
}
