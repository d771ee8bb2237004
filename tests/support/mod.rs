use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

/// Encode a solid-colour PNG of the given dimensions.
#[must_use]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 60, 30])));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap_or_else(|_| unreachable!("in-memory PNG encoding"));
    bytes.into_inner()
}
