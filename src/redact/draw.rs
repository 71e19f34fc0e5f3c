//! Opaque boxes on rasters.

use image::{Rgb, RgbImage};

use crate::model::BoundingBox;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Fill `bbox`, grown by `padding` pixels on every side, with black.
///
/// The box is clipped to the image. Returns whether any pixel was painted.
pub fn black_out(image: &mut RgbImage, bbox: &BoundingBox, padding: u32) -> bool {
    if bbox.is_empty() {
        return false;
    }
    let left = bbox.left.saturating_sub(padding);
    let top = bbox.top.saturating_sub(padding);
    let right = bbox.right().saturating_add(padding).min(image.width());
    let bottom = bbox.bottom().saturating_add(padding).min(image.height());
    if left >= right || top >= bottom {
        return false;
    }
    for y in top..bottom {
        for x in left..right {
            image.put_pixel(x, y, BLACK);
        }
    }
    true
}
