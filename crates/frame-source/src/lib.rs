//! Frame Source - screen capture into a single latest-wins slot
//!
//! This crate provides the capture half of the control loop:
//! - Canonical `Frame` buffers converted from raw capture surfaces
//! - `FrameSlot`, the single-element hand-off to the inference loop
//! - `FrameSource`, the push-triggered capture task
//! - Optional fire-and-forget debug image persistence
//! - A directory replay surface for running without a real screen

pub mod convert;
pub mod debug;
pub mod errors;
pub mod models;
pub mod replay;
pub mod slot;
pub mod source;
pub mod surface;

pub use convert::canonicalize;
pub use debug::{DebugImageSink, PngDirectorySink};
pub use errors::CaptureError;
pub use models::{Frame, PixelFormat, RawBuffer};
pub use replay::DirectoryReplaySurface;
pub use slot::{FrameSlot, SlotStats};
pub use source::FrameSource;
pub use surface::CaptureSurface;
