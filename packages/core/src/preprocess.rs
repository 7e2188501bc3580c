//! # Image preprocessing
//! Decodes request payloads and builds the fixed-shape NHWC tensor the model expects.
//! Everything happens in memory; the pipeline is deterministic for a given configuration.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INPUT_SIZE: u32 = 160;
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_SIZE,
            height: DEFAULT_INPUT_SIZE,
        }
    }
}

impl InputSize {
    /// `[1, height, width, 3]`
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, CHANNELS]
    }
}

/// Interpolation used when resizing to the model input size.
///
/// Must match what the model saw during training; `Nearest` is the training pipeline's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    #[default]
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "bilinear" | "triangle" => Ok(ResizeFilter::Bilinear),
            "bicubic" | "catmullrom" => Ok(ResizeFilter::Bicubic),
            "gaussian" => Ok(ResizeFilter::Gaussian),
            "lanczos3" | "lanczos" => Ok(ResizeFilter::Lanczos3),
            other => Err(format!("unknown resize filter: {other}")),
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResizeFilter::Nearest => "nearest",
            ResizeFilter::Bilinear => "bilinear",
            ResizeFilter::Bicubic => "bicubic",
            ResizeFilter::Gaussian => "gaussian",
            ResizeFilter::Lanczos3 => "lanczos3",
        };
        f.write_str(name)
    }
}

/// Numeric range of the pixel values fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelScale {
    /// 0..=255, unscaled
    #[default]
    Raw,
    /// 0..=1
    Unit,
}

impl PixelScale {
    fn factor(self) -> f32 {
        match self {
            PixelScale::Raw => 1.0,
            PixelScale::Unit => 1.0 / 255.0,
        }
    }
}

impl FromStr for PixelScale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(PixelScale::Raw),
            "unit" => Ok(PixelScale::Unit),
            other => Err(format!("unknown pixel scale: {other}")),
        }
    }
}

/// A single-image batch in NHWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preprocessor {
    pub size: InputSize,
    pub filter: ResizeFilter,
    pub scale: PixelScale,
}

impl Preprocessor {
    pub fn new(size: InputSize, filter: ResizeFilter, scale: PixelScale) -> Self {
        Self {
            size,
            filter,
            scale,
        }
    }

    pub fn input_size(&self) -> InputSize {
        self.size
    }

    /// Full request path: base64 text to tensor.
    pub fn tensor_from_base64(&self, payload: &str) -> Result<ImageTensor> {
        let bytes = decode_base64(payload)?;
        self.tensor_from_bytes(&bytes)
    }

    pub fn tensor_from_bytes(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let image = decode_image(bytes)?;
        Ok(self.tensor_from_image(&image))
    }

    pub fn tensor_from_image(&self, image: &DynamicImage) -> ImageTensor {
        self.tensor_from_rgb(&image.to_rgb8())
    }

    pub fn tensor_from_rgb(&self, rgb: &RgbImage) -> ImageTensor {
        let InputSize { width, height } = self.size;
        let resized = if rgb.dimensions() == (width, height) {
            rgb.clone()
        } else {
            imageops::resize(rgb, width, height, self.filter.filter_type())
        };

        let factor = self.scale.factor();
        let data = Array4::<f32>::from_shape_fn(
            (1, height as usize, width as usize, CHANNELS),
            |(_, y, x, c)| {
                let p = resized.get_pixel(x as u32, y as u32);
                p[c] as f32 * factor
            },
        );
        ImageTensor::new(data)
    }
}

/// Decodes standard-alphabet base64, tolerating a `data:<mime>;base64,` prefix and
/// embedded whitespace (line-wrapped encoders).
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let payload = match payload.split_once(',') {
        Some((head, rest)) if head.starts_with("data:") => rest,
        _ => payload,
    };

    let cleaned: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::InvalidImage(format!("malformed base64: {e}")))
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::InvalidImage("image payload is empty".into()));
    }
    image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidImage(format!("cannot decode image: {e}")))
}
