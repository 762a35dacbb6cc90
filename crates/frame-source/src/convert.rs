//! Raw capture buffer to canonical RGB888 frame conversion

use chrono::{DateTime, Utc};

use crate::{
    errors::CaptureError,
    models::{Frame, PixelFormat, RawBuffer},
};

/// Convert a raw buffer into a canonical frame.
///
/// Row padding and per-pixel padding are dropped; every malformed buffer
/// is a `Transient` error so the caller can skip it without reporting.
pub fn canonicalize(raw: &RawBuffer, captured_at: DateTime<Utc>) -> Result<Frame, CaptureError> {
    let width = raw.width as usize;
    let height = raw.height as usize;
    if width == 0 || height == 0 {
        return Err(CaptureError::Transient(format!(
            "empty buffer {}x{}",
            raw.width, raw.height
        )));
    }

    let bpp = raw.format.bytes_per_pixel();
    if raw.pixel_stride < bpp {
        return Err(CaptureError::Transient(format!(
            "pixel stride {} smaller than {:?} pixel",
            raw.pixel_stride, raw.format
        )));
    }
    let row_bytes = (width - 1)
        .checked_mul(raw.pixel_stride)
        .and_then(|bytes| bytes.checked_add(bpp))
        .ok_or_else(|| overflow(raw))?;
    if raw.row_stride < row_bytes {
        return Err(CaptureError::Transient(format!(
            "row stride {} smaller than row of {} bytes",
            raw.row_stride, row_bytes
        )));
    }
    // the last row does not need its padding
    let required = (height - 1)
        .checked_mul(raw.row_stride)
        .and_then(|bytes| bytes.checked_add(row_bytes))
        .ok_or_else(|| overflow(raw))?;
    if raw.data.len() < required {
        return Err(CaptureError::Transient(format!(
            "buffer holds {} bytes, {} required",
            raw.data.len(),
            required
        )));
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let row_start = row * raw.row_stride;
        for col in 0..width {
            let at = row_start + col * raw.pixel_stride;
            let px = &raw.data[at..at + bpp];
            match raw.format {
                PixelFormat::Rgba8888 | PixelFormat::Rgb888 => {
                    rgb.extend_from_slice(&px[..3]);
                }
                PixelFormat::Rgb565 => {
                    rgb.extend_from_slice(&expand_rgb565(u16::from_le_bytes([px[0], px[1]])));
                }
                PixelFormat::Luma8 => {
                    rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                }
            }
        }
    }

    Frame::from_rgb(raw.width, raw.height, rgb, captured_at)
}

fn overflow(raw: &RawBuffer) -> CaptureError {
    CaptureError::Transient(format!(
        "strides {}/{} overflow a {}x{} buffer",
        raw.row_stride, raw.pixel_stride, raw.width, raw.height
    ))
}

/// Expand a 5/6/5 pixel by bit replication so full scale maps to 255.
fn expand_rgb565(value: u16) -> [u8; 3] {
    let r = ((value >> 11) & 0x1f) as u8;
    let g = ((value >> 5) & 0x3f) as u8;
    let b = (value & 0x1f) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}
