//! QR code renderer

use crate::error::Result;
use crate::qr::{ImageFormat, RenderedImage};
use image::{DynamicImage, GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

/// Side length of rendered images in pixels
pub const DEFAULT_DIMENSION: u32 = 300;

/// Light border around the symbol, in modules
pub const QUIET_ZONE_MODULES: u32 = 4;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Rasterised barcode shared by every output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    image: GrayImage,
    modules: u32,
}

impl PixelGrid {
    /// Width and height in pixels
    pub fn dimension(&self) -> u32 {
        self.image.width()
    }

    /// Symbol size in modules, without the quiet zone
    pub fn modules(&self) -> u32 {
        self.modules
    }

    /// Grayscale pixels
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Encode the grid in the given container format.
    pub fn encode(&self, format: ImageFormat) -> Result<RenderedImage> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(self.image.clone()).write_to(&mut buffer, format.container())?;
        Ok(RenderedImage {
            bytes: buffer.into_inner(),
            format,
        })
    }
}

/// QR code renderer
pub struct QrRenderer {
    /// Error correction level
    ecc_level: EcLevel,
    /// Target side length in pixels
    dimension: u32,
}

impl QrRenderer {
    /// Create a renderer with medium error correction and 300×300 output
    pub fn new() -> Self {
        Self {
            ecc_level: EcLevel::M,
            dimension: DEFAULT_DIMENSION,
        }
    }

    /// Override the target side length
    pub fn dimension(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }

    /// Build the barcode for `data` and rasterise it.
    ///
    /// The image is `dimension` pixels wide unless the symbol plus quiet zone
    /// needs more, in which case each module gets one pixel. Modules are scaled
    /// by a whole number of pixels and the symbol is centred.
    pub fn rasterize(&self, data: &str) -> Result<PixelGrid> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), self.ecc_level)?;
        let modules = code.width() as u32;
        let colors = code.to_colors();

        let real_size = modules + 2 * QUIET_ZONE_MODULES;
        let size = self.dimension.max(real_size);
        let scale = size / real_size;
        let offset = (size - real_size * scale) / 2 + QUIET_ZONE_MODULES * scale;

        let mut image = GrayImage::from_pixel(size, size, LIGHT);
        for (index, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let x = (index as u32 % modules) * scale + offset;
            let y = (index as u32 / modules) * scale + offset;
            for dy in 0..scale {
                for dx in 0..scale {
                    image.put_pixel(x + dx, y + dy, DARK);
                }
            }
        }

        tracing::trace!(modules, size, scale, "Rasterised QR code");
        Ok(PixelGrid { image, modules })
    }

    /// Render `data` into an encoded image.
    pub fn render(&self, data: &str, format: ImageFormat) -> Result<RenderedImage> {
        self.rasterize(data)?.encode(format)
    }
}

impl Default for QrRenderer {
    fn default() -> Self {
        Self::new()
    }
}
