//! Whole-image context cues.
//!
//! [`BodyContext`] estimates whether an image is dominated by skin or body
//! content; drug indicators are suppressed under that context because skin
//! texture and rounded body contours mimic powder and pills. The simple-image
//! gate recognizes flat, low-information images before any extractor runs.

use crate::features::RawSignal;
use crate::raster::color::{max_fraction, ColorRange};
use crate::raster::{filters, shapes, Frame};

/// Body-context analyzer configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// HSV skin ranges; the best single range counts.
    pub skin_ranges: Vec<ColorRange>,
    pub smooth_kernel: u32,
    pub smooth_tolerance: u8,
    pub organic_canny: [f32; 2],
    /// Organic contours cover more than this fraction of the image each.
    pub organic_min_area_frac: f64,
    /// Organic contour solidity range `(min, max)`, exclusive.
    pub organic_solidity: [f64; 2],
    /// Skin ratio that alone raises body context.
    pub skin_alone: f32,
    /// `(skin, smoothness)` pair that raises body context.
    pub skin_with_smoothness: [f32; 2],
    /// `(skin, organic)` pair that raises body context.
    pub skin_with_organic: [f32; 2],
    /// Multiplier applied to every drug indicator under body context.
    pub drug_penalty: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            skin_ranges: vec![
                ColorRange::new([0, 10, 60], [20, 150, 255]),
                ColorRange::new([0, 10, 50], [25, 120, 230]),
                ColorRange::new([0, 20, 80], [25, 180, 255]),
                ColorRange::new([0, 30, 40], [30, 200, 200]),
                ColorRange::new([5, 25, 70], [15, 140, 240]),
            ],
            smooth_kernel: 21,
            smooth_tolerance: 15,
            organic_canny: [30.0, 80.0],
            organic_min_area_frac: 0.05,
            organic_solidity: [0.6, 0.9],
            skin_alone: 0.3,
            skin_with_smoothness: [0.15, 0.5],
            skin_with_organic: [0.2, 0.3],
            drug_penalty: 0.3,
        }
    }
}

/// Context cues measured on one image.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BodyContext {
    pub skin_ratio: f32,
    pub smoothness_ratio: f32,
    pub organic_score: f32,
    pub likely_body: bool,
}

impl BodyContext {
    /// Decide body context from the three cues.
    pub fn from_cues(skin: f32, smoothness: f32, organic: f32, config: &ContextConfig) -> Self {
        let [s_smooth, smooth] = config.skin_with_smoothness;
        let [s_org, org] = config.skin_with_organic;
        let likely_body = skin > config.skin_alone
            || (skin > s_smooth && smoothness > smooth)
            || (skin > s_org && organic > org);
        Self {
            skin_ratio: skin,
            smoothness_ratio: smoothness,
            organic_score: organic,
            likely_body,
        }
    }

    /// Measure the cues on `frame`.
    pub(crate) fn analyze(frame: &Frame<'_>, config: &ContextConfig) -> Self {
        let skin = max_fraction(frame.hsv(), &config.skin_ranges);
        let gray = frame.gray();
        let blurred = filters::blur(gray, filters::sigma_for_kernel(config.smooth_kernel));
        let smoothness = filters::fraction_close(gray, &blurred, config.smooth_tolerance);
        let organic = organic_score(frame, config);
        let ctx = Self::from_cues(skin, smoothness, organic, config);
        tracing::debug!(
            skin = ctx.skin_ratio,
            smoothness = ctx.smoothness_ratio,
            organic = ctx.organic_score,
            likely_body = ctx.likely_body,
            "body context"
        );
        ctx
    }

    /// Drug signals after suppression (unchanged when no body context).
    pub fn apply(&self, signals: &[RawSignal], config: &ContextConfig) -> Vec<RawSignal> {
        if !self.likely_body {
            return signals.to_vec();
        }
        signals.iter().map(|s| s.scaled(config.drug_penalty)).collect()
    }
}

fn organic_score(frame: &Frame<'_>, config: &ContextConfig) -> f32 {
    let total = frame.pixel_count() as f64;
    let (w, h) = frame.dimensions();
    if total <= 0.0 || w < 3 || h < 3 {
        return 0.0;
    }
    let [lo, hi] = config.organic_canny;
    let edges = imageproc::edges::canny(frame.gray(), lo, hi);
    let [s_lo, s_hi] = config.organic_solidity;
    let covered: f64 = shapes::external_shapes(&edges)
        .iter()
        .filter(|s| s.area() > config.organic_min_area_frac * total)
        .filter(|s| s.solidity().is_some_and(|v| v > s_lo && v < s_hi))
        .map(|s| s.area() / total)
        .sum();
    covered.min(1.0) as f32
}

/// Low-information image detection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimpleImageConfig {
    pub enabled: bool,
    /// Per-channel RGB standard deviation below which an image may be simple.
    pub max_std: f64,
    pub canny: [f32; 2],
    /// Edge density below which an image may be simple.
    pub max_edge_density: f32,
    /// Confidence reported for every category of a simple image.
    pub confidence: f32,
}

impl Default for SimpleImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_std: 30.0,
            canny: [50.0, 150.0],
            max_edge_density: 0.05,
            confidence: 0.01,
        }
    }
}

/// Measured complexity of one image.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageComplexity {
    pub rgb_std: f64,
    pub edge_density: f32,
    pub is_simple: bool,
}

impl ImageComplexity {
    pub(crate) fn measure(frame: &Frame<'_>, config: &SimpleImageConfig) -> Self {
        let rgb_std = filters::rgb_max_channel_std(frame.rgb());
        let [lo, hi] = config.canny;
        let edge_density = filters::fraction_nonzero(&imageproc::edges::canny(frame.gray(), lo, hi));
        Self {
            rgb_std,
            edge_density,
            is_simple: config.enabled
                && rgb_std < config.max_std
                && edge_density < config.max_edge_density,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn context_rules() {
        let cfg = ContextConfig::default();
        assert!(BodyContext::from_cues(0.35, 0.0, 0.0, &cfg).likely_body);
        assert!(BodyContext::from_cues(0.2, 0.6, 0.0, &cfg).likely_body);
        assert!(BodyContext::from_cues(0.25, 0.1, 0.4, &cfg).likely_body);
        assert!(!BodyContext::from_cues(0.25, 0.4, 0.2, &cfg).likely_body);
        assert!(!BodyContext::from_cues(0.1, 0.9, 0.9, &cfg).likely_body);
    }

    #[test]
    fn penalty_scales_scores_only() {
        let cfg = ContextConfig::default();
        let ctx = BodyContext::from_cues(0.5, 0.0, 0.0, &cfg);
        let signals = vec![
            RawSignal::score("pills", 0.8),
            RawSignal::failed("powder", crate::features::ExtractorError::NonFinite),
        ];
        let out = ctx.apply(&signals, &cfg);
        approx::assert_relative_eq!(out[0].value(), 0.24, epsilon = 1e-6);
        assert!(out[1].is_failed());
    }

    #[test]
    fn skin_frame_raises_context() {
        let img = RgbImage::from_pixel(60, 60, Rgb([220, 170, 140]));
        let ctx = BodyContext::analyze(&Frame::new(&img), &ContextConfig::default());
        assert!(ctx.skin_ratio > 0.9);
        assert!(ctx.likely_body);
    }

    #[test]
    fn flat_frame_is_simple() {
        let img = RgbImage::from_pixel(60, 60, Rgb([40, 90, 160]));
        let c = ImageComplexity::measure(&Frame::new(&img), &SimpleImageConfig::default());
        assert!(c.is_simple);
        assert_eq!(c.edge_density, 0.0);
    }
}
