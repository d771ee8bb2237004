//! Image decoding and resizing for the inference pipeline.
//!
//! Decoding records the original dimensions before any resizing so the
//! attention heatmap can be produced at the dimensions the caller supplied,
//! not at the model's input resolution.

use image::{DynamicImage, RgbImage, imageops::FilterType};
use thiserror::Error;

/// Long-side limit applied before model preprocessing.
pub const MAX_INPUT_SIDE: u32 = 224;

/// Errors raised while decoding or preparing an image.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// The supplied bytes are empty.
    #[error("image payload is empty")]
    EmptyPayload,
    /// The bytes do not decode as a supported image format.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
}

/// A decoded RGB image plus its pre-resize dimensions.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    original_width: u32,
    original_height: u32,
    pixels: RgbImage,
}

impl DecodedImage {
    /// Decode `bytes` into RGB, recording the original dimensions.
    ///
    /// Oversized inputs are downscaled aspect-preserving so the long side is
    /// at most [`MAX_INPUT_SIDE`]; the recorded dimensions are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`ImagingError::EmptyPayload`] for empty input and
    /// [`ImagingError::Decode`] when the bytes are not a decodable image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImagingError> {
        if bytes.is_empty() {
            return Err(ImagingError::EmptyPayload);
        }
        let decoded = image::load_from_memory(bytes).map_err(ImagingError::Decode)?;
        Ok(Self::from_dynamic(decoded))
    }

    /// Wrap an already-decoded image.
    #[must_use]
    pub fn from_dynamic(decoded: DynamicImage) -> Self {
        let original_width = decoded.width();
        let original_height = decoded.height();
        let longest = original_width.max(original_height);
        let pixels = if longest > MAX_INPUT_SIDE {
            decoded
                .resize(MAX_INPUT_SIDE, MAX_INPUT_SIDE, FilterType::Lanczos3)
                .into_rgb8()
        } else {
            decoded.into_rgb8()
        };
        Self {
            original_width,
            original_height,
            pixels,
        }
    }

    /// Width of the image as supplied, before any resizing.
    #[must_use]
    pub const fn original_width(&self) -> u32 {
        self.original_width
    }

    /// Height of the image as supplied, before any resizing.
    #[must_use]
    pub const fn original_height(&self) -> u32 {
        self.original_height
    }

    /// The working RGB pixels (downscaled when the input was oversized).
    #[must_use]
    pub const fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Resize the working pixels to an exact square of `side` pixels.
    #[must_use]
    pub fn to_square(&self, side: u32) -> RgbImage {
        image::imageops::resize(&self.pixels, side, side, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 80, 40])))
    }

    #[test]
    fn records_original_dimensions() {
        let decoded = DecodedImage::from_dynamic(solid(800, 600));
        assert_eq!(decoded.original_width(), 800);
        assert_eq!(decoded.original_height(), 600);
    }

    #[test]
    fn downscales_oversized_inputs_preserving_aspect() {
        let decoded = DecodedImage::from_dynamic(solid(800, 600));
        let pixels = decoded.pixels();
        assert_eq!(pixels.width(), 224);
        assert_eq!(pixels.height(), 168);
    }

    #[test]
    fn small_inputs_are_left_alone() {
        let decoded = DecodedImage::from_dynamic(solid(100, 64));
        assert_eq!(decoded.pixels().width(), 100);
        assert_eq!(decoded.pixels().height(), 64);
    }

    #[test]
    fn to_square_produces_the_model_resolution() {
        let decoded = DecodedImage::from_dynamic(solid(640, 480));
        let square = decoded.to_square(224);
        assert_eq!((square.width(), square.height()), (224, 224));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            DecodedImage::from_bytes(&[]),
            Err(ImagingError::EmptyPayload)
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            DecodedImage::from_bytes(&[0x00, 0x01, 0x02, 0x03]),
            Err(ImagingError::Decode(_))
        ));
    }
}
