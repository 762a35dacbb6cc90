//! Frame and raw buffer data types

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbImage;
use screenpilot_core_types::FrameId;

use crate::errors::CaptureError;

/// Pixel layouts a capture surface may hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8888,
    Rgb888,
    /// 16-bit little-endian 5/6/5.
    Rgb565,
    Luma8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Luma8 => 1,
        }
    }
}

/// Buffer as acquired from a capture surface, possibly with row padding.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    pub width: u32,
    pub height: u32,
    /// Bytes from the start of one row to the start of the next.
    pub row_stride: usize,
    /// Bytes from one pixel to the next within a row.
    pub pixel_stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawBuffer {
    /// Tightly packed buffer (no row or pixel padding).
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        let pixel_stride = format.bytes_per_pixel();
        Self {
            width,
            height,
            row_stride: width as usize * pixel_stride,
            pixel_stride,
            format,
            data,
        }
    }
}

/// Immutable canonical screen snapshot.
///
/// Pixels are always tightly packed RGB888, row-major, top-left origin.
/// Cloning is cheap; the pixel storage is shared.
#[derive(Debug, Clone)]
pub struct Frame {
    id: FrameId,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
    pixels: Arc<[u8]>,
}

impl Frame {
    pub const FORMAT: PixelFormat = PixelFormat::Rgb888;

    pub fn from_rgb(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::Transient(format!(
                "empty frame {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(CaptureError::Transient(format!(
                "rgb frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            id: FrameId::new(),
            width,
            height,
            captured_at,
            pixels: pixels.into(),
        })
    }

    pub fn id(&self) -> &FrameId {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        Self::FORMAT
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy into an `image` buffer for resampling or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        // length is validated at construction
        RgbImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}
