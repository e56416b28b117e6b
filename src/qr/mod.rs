//! QR code rendering and decoding
//!
//! Links are rendered once into a [`PixelGrid`] and the grid is then written
//! in the requested container format, so PNG and BMP output always carry the
//! same barcode.

mod decoder;
mod encoder;

pub use decoder::QrDecoder;
pub use encoder::{PixelGrid, QrRenderer, DEFAULT_DIMENSION, QUIET_ZONE_MODULES};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raster container formats for rendered codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics
    #[default]
    Png,
    /// Windows bitmap
    Bmp,
}

impl ImageFormat {
    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Bmp => "bmp",
        }
    }

    pub(crate) fn container(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Bmp => image::ImageFormat::Bmp,
        }
    }

    /// Parse a format identifier (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "Unsupported image format '{value}', expected 'png' or 'bmp'"
            ))
        })
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An encoded image ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Container format of `bytes`
    pub format: ImageFormat,
}

impl RenderedImage {
    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
