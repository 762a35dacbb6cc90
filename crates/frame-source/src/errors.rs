//! Error types for frame capture

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Buffer could not be read or converted; the frame is skipped.
    #[error("capture buffer unreadable: {0}")]
    Transient(String),

    /// The capture surface is gone; the current capture session ends.
    #[error("capture surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// Debug copy could not be written.
    #[error("debug image persistence failed: {0}")]
    Persist(String),
}

impl CaptureError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Transient(_))
    }
}
