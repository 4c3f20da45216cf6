//! Decoded raster views and the low-level image operations extractors share.
//!
//! A [`Frame`] is built once per image and holds the RGB source together with
//! the grayscale and HSV conversions every extractor reads from. Nothing in a
//! frame is mutated after construction.

pub(crate) mod color;
pub(crate) mod filters;
pub(crate) mod shapes;
pub(crate) mod stats;

use image::{GrayImage, RgbImage};

use crate::error::ModerationError;

pub use color::ColorRange;

/// Read-only per-image views handed to the extractors.
pub(crate) struct Frame<'a> {
    rgb: &'a RgbImage,
    gray: GrayImage,
    hsv: Vec<[u8; 3]>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(rgb: &'a RgbImage) -> Self {
        Self {
            rgb,
            gray: image::imageops::grayscale(rgb),
            hsv: color::to_hsv(rgb),
        }
    }

    pub(crate) fn rgb(&self) -> &RgbImage {
        self.rgb
    }

    pub(crate) fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// HSV pixels in row-major order (H in 0..=180, S and V in 0..=255).
    pub(crate) fn hsv(&self) -> &[[u8; 3]] {
        &self.hsv
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub(crate) fn pixel_count(&self) -> usize {
        let (w, h) = self.dimensions();
        w as usize * h as usize
    }
}

/// Decode encoded image bytes (any format enabled in `image`) into RGB8.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ModerationError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(ModerationError::EmptyImage { width, height });
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_truncated_png() {
        let img = RgbImage::from_pixel(16, 16, image::Rgb([10, 20, 30]));
        let bytes = crate::test_utils::encode_png(&img);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode_rgb(truncated),
            Err(ModerationError::Decode(_))
        ));
    }

    #[test]
    fn frame_views_share_dimensions() {
        let img = RgbImage::from_pixel(7, 5, image::Rgb([200, 100, 50]));
        let frame = Frame::new(&img);
        assert_eq!(frame.gray().dimensions(), (7, 5));
        assert_eq!(frame.hsv().len(), 35);
        assert_eq!(frame.pixel_count(), 35);
    }
}
