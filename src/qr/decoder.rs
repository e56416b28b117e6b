//! QR code decoder using rqrr, used to read rendered codes back

use crate::error::{Error, Result};
use image::{DynamicImage, GrayImage};

/// QR code decoder
pub struct QrDecoder {}

impl QrDecoder {
    /// Create a new QR decoder with default settings
    pub fn new() -> Self {
        Self {}
    }

    /// Decode an encoded image (PNG, BMP)
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<String> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::QrDecode(format!("Unreadable image: {e}")))?;
        self.decode(&img)
    }

    /// Decode a QR code from an image
    pub fn decode(&self, img: &DynamicImage) -> Result<String> {
        self.decode_gray(&img.to_luma8())
    }

    /// Decode a QR code from a grayscale image
    pub fn decode_gray(&self, img: &GrayImage) -> Result<String> {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());

        let grids = prepared.detect_grids();

        // Rendered codes hold exactly one symbol
        let grid = grids.first().ok_or(Error::NoQrCodeFound)?;

        match grid.decode() {
            Ok((meta, content)) => {
                tracing::debug!(
                    "Decoded QR: version={:?}, ecc_level={:?}, length={}",
                    meta.version,
                    meta.ecc_level,
                    content.len()
                );
                Ok(content)
            }
            Err(e) => Err(Error::QrDecode(format!("Decode failed: {:?}", e))),
        }
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_has_no_code() {
        let blank = GrayImage::from_pixel(120, 120, image::Luma([255]));
        let err = QrDecoder::new().decode_gray(&blank).unwrap_err();
        assert!(matches!(err, Error::NoQrCodeFound));
    }

    #[test]
    fn garbage_bytes_are_decode_failure() {
        let err = QrDecoder::new().decode_bytes(b"not an image").unwrap_err();
        assert!(matches!(err, Error::QrDecode(_)));
    }
}
