//! Frame to model-input conversion.

use frame_source::Frame;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::errors::TransformError;

/// Shape and normalization the model expects.
///
/// Pixels are resized to `side x side` and each channel value `v` becomes
/// `(v - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorSpec {
    pub side: u32,
    pub channels: usize,
    pub mean: f32,
    pub std: f32,
}

impl Default for TensorSpec {
    fn default() -> Self {
        Self {
            side: 224,
            channels: 3,
            mean: 0.0,
            std: 255.0,
        }
    }
}

impl TensorSpec {
    /// `(height, width, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.side as usize, self.side as usize, self.channels)
    }

    pub fn element_count(&self) -> usize {
        let (h, w, c) = self.shape();
        h * w * c
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        if self.side == 0 {
            return Err(TransformError::InvalidSpec("side is zero".into()));
        }
        if self.std == 0.0 || !self.std.is_finite() {
            return Err(TransformError::InvalidSpec(format!(
                "std {} is not a usable divisor",
                self.std
            )));
        }
        if !matches!(self.channels, 1 | 3) {
            return Err(TransformError::UnsupportedChannels(self.channels));
        }
        Ok(())
    }
}

/// Normalized HWC input for one forward pass.
#[derive(Debug, Clone)]
pub struct InputTensor {
    data: Array3<f32>,
}

impl InputTensor {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }
}

pub fn to_tensor(frame: &Frame, spec: &TensorSpec) -> Result<InputTensor, TransformError> {
    spec.validate()?;
    if frame.width() == 0 || frame.height() == 0 || frame.pixels().is_empty() {
        return Err(TransformError::EmptyFrame);
    }

    let resized = imageops::resize(
        &frame.to_rgb_image(),
        spec.side,
        spec.side,
        FilterType::Triangle,
    );

    let data = if spec.channels == 1 {
        let luma = DynamicImage::ImageRgb8(resized).to_luma8();
        Array3::from_shape_fn(spec.shape(), |(y, x, _)| {
            normalize(luma.get_pixel(x as u32, y as u32).0[0], spec)
        })
    } else {
        Array3::from_shape_fn(spec.shape(), |(y, x, c)| {
            normalize(resized.get_pixel(x as u32, y as u32).0[c], spec)
        })
    };

    Ok(InputTensor::new(data))
}

fn normalize(value: u8, spec: &TensorSpec) -> f32 {
    (value as f32 - spec.mean) / spec.std
}
