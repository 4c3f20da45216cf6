//! Smoothing, second-derivative and morphology helpers on grayscale images.

use image::GrayImage;

/// Gaussian sigma equivalent to an odd `k`×`k` kernel with automatic sigma.
///
/// Matches the usual `0.3·((k−1)/2 − 1) + 0.8` rule so kernel sizes in the
/// configuration keep their conventional meaning.
pub(crate) fn sigma_for_kernel(k: u32) -> f32 {
    let k = k.max(1) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian blur; a non-positive sigma returns an unmodified copy.
pub(crate) fn blur(gray: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return gray.clone();
    }
    imageproc::filter::gaussian_blur_f32(gray, sigma)
}

#[inline]
fn reflect101(i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * (n - 1) - i;
    }
    i.clamp(0, n - 1) as usize
}

/// Population variance of the 4-neighbour Laplacian response.
///
/// Borders are reflected without duplicating the edge pixel.
pub(crate) fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let n = w as usize * h as usize;
    if n == 0 {
        return 0.0;
    }
    let raw = gray.as_raw();
    let stride = w as usize;
    let at = |x: i64, y: i64| raw[reflect101(y, hi) * stride + reflect101(x, wi)] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..hi {
        for x in 0..wi {
            let lap = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }
    let mean = sum / n as f64;
    (sum_sq / n as f64 - mean * mean).max(0.0)
}

/// Fraction of pixels where `|a − b| < tolerance`.
pub(crate) fn fraction_close(a: &GrayImage, b: &GrayImage, tolerance: u8) -> f32 {
    let total = a.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let count = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .filter(|&(&p, &q)| p.abs_diff(q) < tolerance)
        .count();
    count as f32 / total as f32
}

/// Fraction of pixels where `|a − b| > tolerance`.
pub(crate) fn fraction_apart(a: &GrayImage, b: &GrayImage, tolerance: u8) -> f32 {
    let total = a.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let count = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .filter(|&(&p, &q)| p.abs_diff(q) > tolerance)
        .count();
    count as f32 / total as f32
}

/// Fraction of pixels strictly brighter than `level`.
pub(crate) fn fraction_above(gray: &GrayImage, level: u8) -> f32 {
    let total = gray.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    gray.as_raw().iter().filter(|&&p| p > level).count() as f32 / total as f32
}

/// Fraction of non-zero pixels (edge density of a binary edge map).
pub(crate) fn fraction_nonzero(binary: &GrayImage) -> f32 {
    fraction_above(binary, 0)
}

/// Binarize: pixels strictly above `level` become 255.
pub(crate) fn threshold_above(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.iter_mut() {
        *p = if *p > level { 255 } else { 0 };
    }
    out
}

// The 3×3 elliptical structuring element degenerates to a cross.
const CROSS: [(i64, i64); 5] = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];

fn cross_extremum(gray: &GrayImage, take_max: bool) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (wi, hi) = (w as i64, h as i64);
    let mut out = GrayImage::new(w, h);
    for y in 0..hi {
        for x in 0..wi {
            let mut acc = if take_max { u8::MIN } else { u8::MAX };
            for &(dx, dy) in &CROSS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
                    continue;
                }
                let v = gray.get_pixel(nx as u32, ny as u32)[0];
                acc = if take_max { acc.max(v) } else { acc.min(v) };
            }
            out.put_pixel(x as u32, y as u32, image::Luma([acc]));
        }
    }
    out
}

/// Grayscale morphological opening (erode then dilate) with a 3×3 cross.
pub(crate) fn open_cross(gray: &GrayImage) -> GrayImage {
    let eroded = cross_extremum(gray, false);
    cross_extremum(&eroded, true)
}

/// Largest per-channel population standard deviation of an RGB image.
///
/// A solid color of any hue has zero spread.
pub(crate) fn rgb_max_channel_std(rgb: &image::RgbImage) -> f64 {
    let n = rgb.width() as f64 * rgb.height() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    for p in rgb.pixels() {
        for c in 0..3 {
            let v = p.0[c] as f64;
            sum[c] += v;
            sum_sq[c] += v * v;
        }
    }
    (0..3)
        .map(|c| {
            let mean = sum[c] / n;
            (sum_sq[c] / n - mean * mean).max(0.0).sqrt()
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn kernel_sigma_rule() {
        assert_relative_eq!(sigma_for_kernel(15), 2.6, epsilon = 1e-6);
        assert_relative_eq!(sigma_for_kernel(21), 3.5, epsilon = 1e-6);
    }

    #[test]
    fn flat_image_has_zero_laplacian_variance() {
        let img = GrayImage::from_pixel(20, 10, Luma([77]));
        assert_eq!(laplacian_variance(&img), 0.0);
    }

    #[test]
    fn checkerboard_has_large_laplacian_variance() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]));
        assert!(laplacian_variance(&img) > 10_000.0);
    }

    #[test]
    fn opening_removes_isolated_bright_pixels() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([10]));
        img.put_pixel(4, 4, Luma([250]));
        let opened = open_cross(&img);
        assert_eq!(opened.get_pixel(4, 4)[0], 10);
        assert_relative_eq!(fraction_apart(&img, &opened, 5), 1.0 / 81.0);
    }

    #[test]
    fn solid_color_has_no_channel_spread() {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 90, 160]));
        assert_eq!(rgb_max_channel_std(&img), 0.0);
        let mut split = img.clone();
        for x in 0..4 {
            for y in 0..8 {
                split.put_pixel(x, y, image::Rgb([40, 90, 0]));
            }
        }
        assert_relative_eq!(rgb_max_channel_std(&split), 80.0);
    }
}
