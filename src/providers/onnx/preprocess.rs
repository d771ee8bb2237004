//! CLIP image preprocessing.

use crate::imaging::DecodedImage;

/// Per-channel means the CLIP vision tower was trained with.
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// Per-channel standard deviations the CLIP vision tower was trained with.
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Convert an image into a channel-first normalised pixel tensor.
///
/// The image is resized to `size`×`size`, scaled into `[0, 1]`, then
/// normalised per channel. Layout is `[3, size, size]` flattened row-major,
/// matching a `[1, 3, size, size]` graph input.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "pixel normalisation")]
pub fn pixel_tensor(image: &DecodedImage, size: u32) -> Vec<f32> {
    let square = image.to_square(size);
    let side = size as usize;
    let mut tensor = vec![0.0_f32; 3 * side * side];
    for (x, y, pixel) in square.enumerate_pixels() {
        let row = y as usize;
        let col = x as usize;
        for channel in 0..3 {
            let value = f32::from(pixel.0[channel]) / 255.0;
            tensor[channel * side * side + row * side + col] =
                (value - CLIP_MEAN[channel]) / CLIP_STD[channel];
        }
    }
    tensor
}
