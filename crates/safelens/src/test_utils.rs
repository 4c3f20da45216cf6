//! Synthetic images shared by unit tests.

use image::{GrayImage, Luma, RgbImage};

/// Encode an RGB image as PNG bytes.
pub(crate) fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("PNG encoding to memory");
    out.into_inner()
}

/// Regular grid of soft-edged disks on a flat background.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CircleGridSpec {
    pub rows: usize,
    pub cols: usize,
    pub radius: f32,
    /// Center-to-center distance.
    pub spacing: f32,
    /// Distance from the image border to the first center.
    pub margin: f32,
    /// Width of the linear intensity ramp at the disk edge.
    pub ramp: f32,
    pub fg: u8,
    pub bg: u8,
}

impl Default for CircleGridSpec {
    fn default() -> Self {
        Self {
            rows: 6,
            cols: 7,
            radius: 10.0,
            spacing: 50.0,
            margin: 40.0,
            ramp: 3.0,
            fg: 190,
            bg: 70,
        }
    }
}

impl CircleGridSpec {
    pub(crate) fn center(&self, row: usize, col: usize) -> (f32, f32) {
        (
            self.margin + col as f32 * self.spacing,
            self.margin + row as f32 * self.spacing,
        )
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        let w = 2.0 * self.margin + (self.cols.max(1) - 1) as f32 * self.spacing;
        let h = 2.0 * self.margin + (self.rows.max(1) - 1) as f32 * self.spacing;
        (w as u32, h as u32)
    }
}

/// Render a [`CircleGridSpec`] as grayscale.
pub(crate) fn circle_grid_gray(spec: &CircleGridSpec) -> GrayImage {
    let (w, h) = spec.dimensions();
    let (fg, bg) = (spec.fg as f32, spec.bg as f32);
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as f32, y as f32);
        // Nearest grid center.
        let col = ((x - spec.margin) / spec.spacing).round().clamp(0.0, (spec.cols - 1) as f32);
        let row = ((y - spec.margin) / spec.spacing).round().clamp(0.0, (spec.rows - 1) as f32);
        let (cx, cy) = spec.center(row as usize, col as usize);
        let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        let t = ((spec.radius + 0.5 * spec.ramp - d) / spec.ramp).clamp(0.0, 1.0);
        Luma([(bg + t * (fg - bg)).round() as u8])
    })
}

/// RGB version of [`circle_grid_gray`].
pub(crate) fn circle_grid_rgb(spec: &CircleGridSpec) -> RgbImage {
    let gray = circle_grid_gray(spec);
    image::DynamicImage::ImageLuma8(gray).to_rgb8()
}
