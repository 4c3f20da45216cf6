//! Color-space conversion and range masks.
//!
//! HSV uses the 8-bit convention common to vision toolkits: hue is halved to
//! fit `0..=180`, saturation and value span `0..=255`. All published color
//! bounds in the configuration are expressed in that convention.

use image::RgbImage;

/// Inclusive per-channel bounds, in RGB or HSV depending on where it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ColorRange {
    /// Lower bound per channel (inclusive).
    pub lower: [u8; 3],
    /// Upper bound per channel (inclusive).
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, px: [u8; 3]) -> bool {
        (0..3).all(|c| px[c] >= self.lower[c] && px[c] <= self.upper[c])
    }

    /// `true` when every lower bound is at most its upper bound.
    pub fn is_ordered(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c])
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub(crate) fn hsv_from_rgb([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };
    let h_deg = if delta <= 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / delta
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    [
        (h_deg * 0.5).round().min(180.0) as u8,
        s.round() as u8,
        v as u8,
    ]
}

pub(crate) fn to_hsv(rgb: &RgbImage) -> Vec<[u8; 3]> {
    rgb.pixels().map(|p| hsv_from_rgb(p.0)).collect()
}

fn ratio(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32
    }
}

/// Fraction of pixels inside `range`.
pub(crate) fn fraction_in(pixels: &[[u8; 3]], range: &ColorRange) -> f32 {
    let count = pixels.iter().filter(|&&px| range.contains(px)).count();
    ratio(count, pixels.len())
}

/// Fraction of pixels inside at least one of `ranges`.
pub(crate) fn fraction_in_any(pixels: &[[u8; 3]], ranges: &[ColorRange]) -> f32 {
    let count = pixels
        .iter()
        .filter(|&&px| ranges.iter().any(|r| r.contains(px)))
        .count();
    ratio(count, pixels.len())
}

/// Largest single-range coverage among `ranges`.
pub(crate) fn max_fraction(pixels: &[[u8; 3]], ranges: &[ColorRange]) -> f32 {
    ranges
        .iter()
        .map(|r| fraction_in(pixels, r))
        .fold(0.0f32, f32::max)
}

/// Sum of per-range coverages (overlapping ranges count a pixel more than once).
pub(crate) fn summed_fraction(pixels: &[[u8; 3]], ranges: &[ColorRange]) -> f32 {
    ranges.iter().map(|r| fraction_in(pixels, r)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_from_rgb([255, 0, 0]), [0, 255, 255]);
        assert_eq!(hsv_from_rgb([0, 255, 0]), [60, 255, 255]);
        assert_eq!(hsv_from_rgb([0, 0, 255]), [120, 255, 255]);
        assert_eq!(hsv_from_rgb([128, 128, 128]), [0, 0, 128]);
        assert_eq!(hsv_from_rgb([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn union_does_not_double_count() {
        let pixels = vec![[10, 10, 10], [200, 200, 200]];
        let ranges = [
            ColorRange::new([0, 0, 0], [50, 50, 50]),
            ColorRange::new([0, 0, 0], [60, 60, 60]),
        ];
        assert_eq!(fraction_in_any(&pixels, &ranges), 0.5);
        assert_eq!(summed_fraction(&pixels, &ranges), 1.0);
        assert_eq!(max_fraction(&pixels, &ranges), 0.5);
    }
}
