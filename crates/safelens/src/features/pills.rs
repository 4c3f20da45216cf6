//! Pills indicator group: circles, blobs, pill colors and compact shapes.

use super::blobs::{blob_score, BlobConfig};
use super::circles::{circle_score, CircleConfig};
use super::step::{Bound, Step, StepTable};
use super::{combine_weighted, run_extractor, ExtractorError, RawSignal};
use crate::raster::color::{summed_fraction, ColorRange};
use crate::raster::{shapes, Frame};

/// Pill color coverage configuration (HSV ranges).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PillColorConfig {
    pub ranges: Vec<ColorRange>,
    /// Summed coverage → score.
    pub score: StepTable,
}

impl Default for PillColorConfig {
    fn default() -> Self {
        Self {
            ranges: vec![
                // white
                ColorRange::new([0, 0, 200], [180, 30, 255]),
                // blue
                ColorRange::new([100, 50, 50], [130, 255, 255]),
                // red
                ColorRange::new([0, 50, 50], [10, 255, 255]),
                // yellow
                ColorRange::new([20, 50, 50], [30, 255, 255]),
                // green
                ColorRange::new([40, 50, 50], [80, 255, 255]),
            ],
            score: StepTable::new(
                Bound::Above,
                vec![Step::linear(0.3, 1.5, 0.7), Step::linear(0.1, 2.0, 1.0)],
                0.0,
            ),
        }
    }
}

/// Compact contour configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PillShapeConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Contour area range `(min, max)`, exclusive.
    pub area_range: [f64; 2],
    /// Circularity must exceed this.
    pub min_circularity: f64,
    /// Round contour count → score.
    pub score: StepTable,
}

impl Default for PillShapeConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            area_range: [100.0, 2000.0],
            min_circularity: 0.6,
            score: StepTable::new(
                Bound::AtLeast,
                vec![Step::new(3.0, 0.2, 0.1, 0.6), Step::flat(1.0, 0.3)],
                0.0,
            ),
        }
    }
}

/// Pills group configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PillsConfig {
    pub circles: CircleConfig,
    pub blobs: BlobConfig,
    pub colors: PillColorConfig,
    pub shapes: PillShapeConfig,
    /// Component weights for circles, blobs, colors and shapes.
    pub weights: [f32; 4],
}

impl Default for PillsConfig {
    fn default() -> Self {
        Self {
            circles: CircleConfig::default(),
            blobs: BlobConfig::default(),
            colors: PillColorConfig::default(),
            shapes: PillShapeConfig::default(),
            weights: [0.4, 0.3, 0.2, 0.1],
        }
    }
}

pub(crate) fn color_score(frame: &Frame<'_>, config: &PillColorConfig) -> Result<f32, ExtractorError> {
    let ratio = summed_fraction(frame.hsv(), &config.ranges);
    tracing::trace!(ratio, "pill color coverage");
    Ok(config.score.lookup(ratio))
}

pub(crate) fn shape_score(frame: &Frame<'_>, config: &PillShapeConfig) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;

    let edges = imageproc::edges::canny(frame.gray(), config.canny_low, config.canny_high);
    let [lo, hi] = config.area_range;
    let round = shapes::external_shapes(&edges)
        .iter()
        .filter(|s| s.area() > lo && s.area() < hi && s.circularity() > config.min_circularity)
        .count();
    tracing::trace!(round, "pill-like contours");
    Ok(config.score.lookup_count(round))
}

/// Run the four pill extractors and combine them into the group value.
pub(crate) fn extract(frame: &Frame<'_>, config: &PillsConfig) -> (f32, Vec<RawSignal>) {
    let components = vec![
        run_extractor("circles", || circle_score(frame, &config.circles)),
        run_extractor("blobs", || blob_score(frame, &config.blobs)),
        run_extractor("colors", || color_score(frame, &config.colors)),
        run_extractor("shapes", || shape_score(frame, &config.shapes)),
    ];
    let [wc, wb, wk, ws] = config.weights;
    let value = combine_weighted(
        &components,
        &[("circles", wc), ("blobs", wb), ("colors", wk), ("shapes", ws)],
    );
    (value, components)
}
