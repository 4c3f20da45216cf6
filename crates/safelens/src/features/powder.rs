//! Powder indicator group: fine texture, powder colors and granularity.

use super::step::{Bound, Step, StepTable};
use super::{combine_weighted, run_extractor, ExtractorError, RawSignal};
use crate::raster::color::{max_fraction, ColorRange};
use crate::raster::{filters, Frame};

/// Fine-texture configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PowderTextureConfig {
    /// Laplacian variance below this reads as an even powder surface.
    pub flat_variance: f64,
    /// Score added for an even surface.
    pub flat_bonus: f32,
    /// Variance in `(flat_variance, grain_variance)` adds `min(cap, v / grain_variance)`.
    pub grain_variance: f64,
    pub grain_cap: f32,
    /// Blur kernel size for the smoothness ratio.
    pub smooth_kernel: u32,
    /// Absolute difference below which a pixel counts as smooth.
    pub smooth_tolerance: u8,
    /// Smoothness ratio → added score.
    pub smoothness: StepTable,
    /// Pixels brighter than this count as bright.
    pub bright_level: u8,
    /// Bright ratio → added score.
    pub brightness: StepTable,
    /// Cap on the summed texture score.
    pub cap: f32,
}

impl Default for PowderTextureConfig {
    fn default() -> Self {
        Self {
            flat_variance: 20.0,
            flat_bonus: 0.8,
            grain_variance: 300.0,
            grain_cap: 0.7,
            smooth_kernel: 15,
            smooth_tolerance: 10,
            smoothness: StepTable::new(
                Bound::Above,
                vec![
                    Step::flat(0.6, 0.6),
                    Step::flat(0.4, 0.4),
                    Step::flat(0.2, 0.2),
                ],
                0.0,
            ),
            bright_level: 200,
            brightness: StepTable::new(
                Bound::Above,
                vec![Step::linear(0.3, 2.0, 0.8), Step::linear(0.1, 3.0, 0.5)],
                0.0,
            ),
            cap: 0.9,
        }
    }
}

/// Powder color configuration (HSV ranges; the best single range counts).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PowderColorConfig {
    pub ranges: Vec<ColorRange>,
    pub score: StepTable,
}

impl Default for PowderColorConfig {
    fn default() -> Self {
        Self {
            ranges: vec![
                // white
                ColorRange::new([0, 0, 150], [180, 80, 255]),
                // brown
                ColorRange::new([10, 30, 40], [30, 255, 200]),
                // cream
                ColorRange::new([15, 20, 120], [35, 100, 240]),
            ],
            score: StepTable::new(
                Bound::Above,
                vec![
                    Step::linear(0.6, 1.3, 0.95),
                    Step::linear(0.4, 1.8, 0.85),
                    Step::linear(0.2, 2.5, 0.75),
                    Step::linear(0.1, 4.0, 0.6),
                    Step::linear(0.05, 6.0, 0.4),
                ],
                0.0,
            ),
        }
    }
}

/// Granular pattern configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PowderPatternConfig {
    /// Difference from the morphological opening that counts as a grain.
    pub grain_tolerance: u8,
    pub score: StepTable,
}

impl Default for PowderPatternConfig {
    fn default() -> Self {
        Self {
            grain_tolerance: 5,
            score: StepTable::new(
                Bound::Above,
                vec![
                    Step::linear(0.5, 1.4, 0.8),
                    Step::linear(0.3, 2.0, 0.7),
                    Step::linear(0.1, 3.0, 0.5),
                ],
                0.0,
            ),
        }
    }
}

/// Powder group configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PowderConfig {
    pub texture: PowderTextureConfig,
    pub color: PowderColorConfig,
    pub pattern: PowderPatternConfig,
    /// Component weights for texture, color and pattern.
    pub weights: [f32; 3],
}

impl Default for PowderConfig {
    fn default() -> Self {
        Self {
            texture: PowderTextureConfig::default(),
            color: PowderColorConfig::default(),
            pattern: PowderPatternConfig::default(),
            weights: [0.5, 0.3, 0.2],
        }
    }
}

pub(crate) fn texture_score(
    frame: &Frame<'_>,
    config: &PowderTextureConfig,
) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;
    let gray = frame.gray();

    let variance = filters::laplacian_variance(gray);
    let mut score = if variance < config.flat_variance {
        config.flat_bonus
    } else if variance > config.flat_variance && variance < config.grain_variance {
        ((variance / config.grain_variance) as f32).min(config.grain_cap)
    } else {
        0.0
    };

    let blurred = filters::blur(gray, filters::sigma_for_kernel(config.smooth_kernel));
    let smooth = filters::fraction_close(gray, &blurred, config.smooth_tolerance);
    score += config.smoothness.lookup(smooth);

    let bright = filters::fraction_above(gray, config.bright_level);
    score += config.brightness.lookup(bright);

    tracing::trace!(variance, smooth, bright, "powder texture");
    Ok(score.min(config.cap))
}

pub(crate) fn color_score(frame: &Frame<'_>, config: &PowderColorConfig) -> Result<f32, ExtractorError> {
    let coverage = max_fraction(frame.hsv(), &config.ranges);
    Ok(config.score.lookup(coverage))
}

pub(crate) fn pattern_score(
    frame: &Frame<'_>,
    config: &PowderPatternConfig,
) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;
    let opened = filters::open_cross(frame.gray());
    let granular = filters::fraction_apart(frame.gray(), &opened, config.grain_tolerance);
    Ok(config.score.lookup(granular))
}

/// Run the powder extractors and combine them into the group value.
pub(crate) fn extract(frame: &Frame<'_>, config: &PowderConfig) -> (f32, Vec<RawSignal>) {
    let components = vec![
        run_extractor("powder_texture", || texture_score(frame, &config.texture)),
        run_extractor("powder_color", || color_score(frame, &config.color)),
        run_extractor("powder_pattern", || pattern_score(frame, &config.pattern)),
    ];
    let [wt, wc, wp] = config.weights;
    let value = combine_weighted(
        &components,
        &[
            ("powder_texture", wt),
            ("powder_color", wc),
            ("powder_pattern", wp),
        ],
    );
    (value, components)
}
