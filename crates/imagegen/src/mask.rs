//! PNG helpers and the DALL·E edit mask.
//!
//! The edit endpoint regenerates the transparent pixels of the mask and keeps
//! the opaque ones. The reference tile is the source tile, so the half that
//! borders the new cell stays opaque and seeds the seam, while the far half
//! is regenerated:
//!
//! | Direction | Transparent region |
//! |-----------|--------------------|
//! | `E`       | `x < size / 2`     |
//! | `W`       | `x >= size / 2`    |
//! | `S`       | `y < size / 2`     |
//! | `N`       | `y >= size / 2`    |

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use jigsaw_core::grid::Direction;

use crate::provider::GenerationError;

const OPAQUE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Whether pixel `(x, y)` is regenerated when expanding in `direction`.
pub fn is_edited(direction: Direction, x: u32, y: u32, size: u32) -> bool {
    let half = size / 2;
    match direction {
        Direction::East => x < half,
        Direction::West => x >= half,
        Direction::South => y < half,
        Direction::North => y >= half,
    }
}

pub fn edit_mask(size: u32, direction: Direction) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if is_edited(direction, x, y, size) {
            TRANSPARENT
        } else {
            OPAQUE
        }
    })
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: DynamicImage) -> Result<Vec<u8>, GenerationError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Decode any supported format, crop-resize to `size`×`size`, add an alpha
/// channel and re-encode as PNG.
pub fn prepare_reference(bytes: &[u8], size: u32) -> Result<Vec<u8>, GenerationError> {
    let decoded = image::load_from_memory(bytes)?;
    let square = decoded.resize_to_fill(size, size, image::imageops::FilterType::Lanczos3);
    encode_png(DynamicImage::ImageRgba8(square.to_rgba8()))
}
