#![allow(dead_code)]

use image::{Rgb, RgbImage};

pub const SKIN: [u8; 3] = [190, 130, 100];

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// `rows`×`cols` soft-edged disks of radius 10, 50 px apart.
pub fn disk_grid(rows: u32, cols: u32, fg: [u8; 3], bg: [u8; 3]) -> RgbImage {
    let (margin, spacing, radius, ramp) = (40.0f32, 50.0f32, 10.0f32, 3.0f32);
    let w = (2.0 * margin + (cols - 1) as f32 * spacing) as u32;
    let h = (2.0 * margin + (rows - 1) as f32 * spacing) as u32;
    RgbImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as f32, y as f32);
        let col = ((x - margin) / spacing).round().clamp(0.0, (cols - 1) as f32);
        let row = ((y - margin) / spacing).round().clamp(0.0, (rows - 1) as f32);
        let (cx, cy) = (margin + col * spacing, margin + row * spacing);
        let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        let t = ((radius + 0.5 * ramp - d) / ramp).clamp(0.0, 1.0);
        let mix = |c: usize| (bg[c] as f32 + t * (fg[c] as f32 - bg[c] as f32)).round() as u8;
        Rgb([mix(0), mix(1), mix(2)])
    })
}

/// Top half `top`, bottom half black.
pub fn half_split(width: u32, height: u32, top: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        if y < height / 2 {
            Rgb(top)
        } else {
            Rgb([0, 0, 0])
        }
    })
}
