//! Intensity statistics over circular image regions.

use image::GrayImage;

/// Mean and standard deviation of the pixels inside a disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DiskStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Statistics over the disk of radius `r` centered on `(cx, cy)`.
///
/// Pixels outside the image are skipped; an empty intersection yields zeros.
pub(crate) fn disk_stats(gray: &GrayImage, cx: f32, cy: f32, r: f32) -> DiskStats {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 || r <= 0.0 {
        return DiskStats {
            mean: 0.0,
            std: 0.0,
            count: 0,
        };
    }
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil().max(0.0) as u32).min(w - 1);
    let y1 = ((cy + r).ceil().max(0.0) as u32).min(h - 1);
    let r2 = r * r;

    let mut count = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in y0..=y1 {
        let dy = y as f32 - cy;
        for x in x0..=x1 {
            let dx = x as f32 - cx;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = gray.get_pixel(x, y)[0] as f64;
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }
    if count == 0 {
        return DiskStats {
            mean: 0.0,
            std: 0.0,
            count: 0,
        };
    }
    let mean = sum / count as f64;
    DiskStats {
        mean,
        std: (sum_sq / count as f64 - mean * mean).max(0.0).sqrt(),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    #[test]
    fn uniform_disk_has_zero_spread() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([40]));
        draw_filled_circle_mut(&mut img, (30, 30), 12, Luma([180]));
        let s = disk_stats(&img, 30.0, 30.0, 8.0);
        assert!(s.count > 150);
        assert_eq!(s.mean, 180.0);
        assert_eq!(s.std, 0.0);
    }

    #[test]
    fn disk_is_clipped_to_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([100]));
        let s = disk_stats(&img, 0.0, 0.0, 5.0);
        assert!(s.count > 0 && s.count < 40);
        let outside = disk_stats(&img, -50.0, -50.0, 3.0);
        assert_eq!(outside.count, 0);
    }
}
