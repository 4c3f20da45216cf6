//! Plants indicator group: vegetation color, leaf contours and foliage texture.

use super::step::{Bound, Step, StepTable};
use super::{combine_weighted, run_extractor, ExtractorError, RawSignal};
use crate::raster::color::{max_fraction, ColorRange};
use crate::raster::{filters, shapes, Frame};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GreenConfig {
    pub ranges: Vec<ColorRange>,
    pub score: StepTable,
}

impl Default for GreenConfig {
    fn default() -> Self {
        Self {
            ranges: vec![
                ColorRange::new([35, 40, 40], [85, 255, 255]),
                ColorRange::new([40, 50, 50], [80, 255, 200]),
                ColorRange::new([25, 30, 30], [95, 255, 180]),
            ],
            score: StepTable::new(
                Bound::Above,
                vec![Step::linear(0.5, 1.2, 0.8), Step::linear(0.3, 1.0, 1.0)],
                0.0,
            ),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LeafConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    pub min_area: f64,
    /// Solidity range `(min, max)`, exclusive: serrated but not fragmented.
    pub solidity_range: [f64; 2],
    pub score: StepTable,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 100.0,
            min_area: 500.0,
            solidity_range: [0.6, 0.9],
            score: StepTable::new(
                Bound::AtLeast,
                vec![Step::new(3.0, 0.3, 0.1, 0.7), Step::flat(1.0, 0.4)],
                0.0,
            ),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FoliageTextureConfig {
    /// Laplacian variance range `(min, max)`, exclusive.
    pub variance_range: [f64; 2],
    pub cap: f32,
}

impl Default for FoliageTextureConfig {
    fn default() -> Self {
        Self {
            variance_range: [200.0, 2000.0],
            cap: 0.6,
        }
    }
}

/// Plants group configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlantsConfig {
    pub green: GreenConfig,
    pub leaf: LeafConfig,
    pub texture: FoliageTextureConfig,
    /// Component weights for green, leaf and texture.
    pub weights: [f32; 3],
}

impl Default for PlantsConfig {
    fn default() -> Self {
        Self {
            green: GreenConfig::default(),
            leaf: LeafConfig::default(),
            texture: FoliageTextureConfig::default(),
            weights: [0.4, 0.4, 0.2],
        }
    }
}

pub(crate) fn green_score(frame: &Frame<'_>, config: &GreenConfig) -> Result<f32, ExtractorError> {
    Ok(config.score.lookup(max_fraction(frame.hsv(), &config.ranges)))
}

pub(crate) fn leaf_score(frame: &Frame<'_>, config: &LeafConfig) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;
    let edges = imageproc::edges::canny(frame.gray(), config.canny_low, config.canny_high);
    let [lo, hi] = config.solidity_range;
    let leaves = shapes::external_shapes(&edges)
        .iter()
        .filter(|s| s.area() > config.min_area)
        .filter(|s| s.solidity().is_some_and(|v| v > lo && v < hi))
        .count();
    Ok(config.score.lookup_count(leaves))
}

pub(crate) fn texture_score(
    frame: &Frame<'_>,
    config: &FoliageTextureConfig,
) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;
    let v = filters::laplacian_variance(frame.gray());
    let [lo, hi] = config.variance_range;
    if v > lo && v < hi {
        Ok(((v / hi) as f32).min(config.cap))
    } else {
        Ok(0.0)
    }
}

/// Run the plant extractors and combine them into the group value.
pub(crate) fn extract(frame: &Frame<'_>, config: &PlantsConfig) -> (f32, Vec<RawSignal>) {
    let components = vec![
        run_extractor("plant_green", || green_score(frame, &config.green)),
        run_extractor("plant_leaf", || leaf_score(frame, &config.leaf)),
        run_extractor("plant_texture", || texture_score(frame, &config.texture)),
    ];
    let [wg, wl, wt] = config.weights;
    let value = combine_weighted(
        &components,
        &[("plant_green", wg), ("plant_leaf", wl), ("plant_texture", wt)],
    );
    (value, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    #[test]
    fn saturated_green_frame() {
        let img = RgbImage::from_pixel(20, 20, Rgb([30, 160, 40]));
        let frame = Frame::new(&img);
        assert_relative_eq!(green_score(&frame, &GreenConfig::default()).unwrap(), 0.8);
        let (value, _) = extract(&frame, &PlantsConfig::default());
        assert_relative_eq!(value, 0.32, epsilon = 1e-6);
    }

    #[test]
    fn foliage_texture_window() {
        let cfg = FoliageTextureConfig::default();
        let flat = RgbImage::from_pixel(20, 20, Rgb([30, 160, 40]));
        assert_eq!(texture_score(&Frame::new(&flat), &cfg).unwrap(), 0.0);
    }
}
