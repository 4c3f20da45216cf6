//! Multi-threshold blob detection.
//!
//! The grayscale image is binarized at a sweep of levels in both polarities.
//! Compact, convex, roughly isotropic regions are collected per level and
//! regions that recur at nearby positions across levels are merged into one
//! blob.

use image::GrayImage;

use super::step::{Bound, Step, StepTable};
use super::ExtractorError;
use crate::raster::shapes::{self, Shape};
use crate::raster::Frame;

/// Blob detector configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub min_threshold: u8,
    pub max_threshold: u8,
    pub threshold_step: u8,
    /// Region area range `[min, max]` (pixels²).
    pub area_range: [f64; 2],
    pub min_circularity: f64,
    /// Minimum area / convex-hull area.
    pub min_convexity: f64,
    pub min_inertia_ratio: f64,
    /// Regions closer than this are the same blob (pixels).
    pub min_dist_between: f64,
    /// Minimum number of levels a blob must appear at.
    pub min_repeatability: usize,
    /// Accepted blob diameter range `(min, max)`, exclusive.
    pub diameter_range: [f64; 2],
    /// Valid blob count → score.
    pub score: StepTable,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            min_threshold: 50,
            max_threshold: 220,
            threshold_step: 10,
            area_range: [50.0, 8000.0],
            min_circularity: 0.4,
            min_convexity: 0.6,
            min_inertia_ratio: 0.3,
            min_dist_between: 10.0,
            min_repeatability: 2,
            diameter_range: [5.0, 120.0],
            score: StepTable::new(
                Bound::AtLeast,
                vec![
                    Step::new(5.0, 0.5, 0.08, 0.9),
                    Step::new(3.0, 0.4, 0.1, 0.8),
                    Step::new(2.0, 0.3, 0.15, 0.7),
                    Step::flat(1.0, 0.5),
                ],
                0.0,
            ),
        }
    }
}

/// A blob merged across threshold levels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Blob {
    pub x: f64,
    pub y: f64,
    /// Median radius over the merged regions.
    pub radius: f64,
    /// Number of levels the blob appeared at.
    pub repeats: usize,
}

impl Blob {
    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }
}

#[derive(Debug)]
struct BlobGroup {
    bright: bool,
    x: f64,
    y: f64,
    radii: Vec<f64>,
}

fn region_passes(shape: &Shape, config: &BlobConfig) -> bool {
    let area = shape.area();
    if area < config.area_range[0] || area > config.area_range[1] {
        return false;
    }
    if shape.circularity() < config.min_circularity {
        return false;
    }
    if shape.solidity().map_or(true, |s| s < config.min_convexity) {
        return false;
    }
    shape.inertia_ratio() >= config.min_inertia_ratio
}

fn binarize(gray: &GrayImage, level: u8, bright: bool) -> GrayImage {
    let mut out = gray.clone();
    for p in out.iter_mut() {
        let on = if bright { *p > level } else { *p <= level };
        *p = if on { 255 } else { 0 };
    }
    out
}

/// Detect blobs recurring across the threshold sweep.
///
/// Regions touching the image border are not blobs.
pub fn find_blobs(gray: &GrayImage, config: &BlobConfig) -> Vec<Blob> {
    let (w, h) = (gray.width() as i32, gray.height() as i32);
    let step = config.threshold_step.max(1) as usize;
    let mut groups: Vec<BlobGroup> = Vec::new();

    for level in (config.min_threshold..=config.max_threshold).step_by(step) {
        for bright in [true, false] {
            let binary = binarize(gray, level, bright);
            for shape in shapes::external_shapes(&binary) {
                let bbox = shape.bounding_box();
                if bbox.x <= 0 || bbox.y <= 0 || bbox.x + bbox.width >= w || bbox.y + bbox.height >= h {
                    continue;
                }
                if !region_passes(&shape, config) {
                    continue;
                }
                let [x, y] = shape.centroid();
                let radius = shape.mean_radius();
                let existing = groups.iter_mut().find(|g| {
                    if g.bright != bright {
                        return false;
                    }
                    let d = ((g.x - x).powi(2) + (g.y - y).powi(2)).sqrt();
                    let group_radius = g.radii.last().copied().unwrap_or(0.0);
                    d < config.min_dist_between || d < group_radius
                });
                match existing {
                    Some(g) => {
                        let n = g.radii.len() as f64;
                        g.x = (g.x * n + x) / (n + 1.0);
                        g.y = (g.y * n + y) / (n + 1.0);
                        g.radii.push(radius);
                    }
                    None => groups.push(BlobGroup {
                        bright,
                        x,
                        y,
                        radii: vec![radius],
                    }),
                }
            }
        }
    }

    groups
        .into_iter()
        .filter(|g| g.radii.len() >= config.min_repeatability)
        .map(|mut g| {
            g.radii.sort_by(|a, b| a.total_cmp(b));
            Blob {
                x: g.x,
                y: g.y,
                radius: g.radii[g.radii.len() / 2],
                repeats: g.radii.len(),
            }
        })
        .collect()
}

/// Blob score for one image.
pub(crate) fn blob_score(frame: &Frame<'_>, config: &BlobConfig) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;

    let blobs = find_blobs(frame.gray(), config);
    let [lo, hi] = config.diameter_range;
    let valid = blobs
        .iter()
        .filter(|b| b.diameter() > lo && b.diameter() < hi)
        .count();
    tracing::debug!(blobs = blobs.len(), valid, "blob detection");
    Ok(config.score.lookup_count(valid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{circle_grid_gray, CircleGridSpec};
    use image::Luma;

    #[test]
    fn flat_image_has_no_blobs() {
        let img = GrayImage::from_pixel(64, 64, Luma([120]));
        assert!(find_blobs(&img, &BlobConfig::default()).is_empty());
    }

    #[test]
    fn grid_disks_become_one_blob_each() {
        let spec = CircleGridSpec::default();
        let img = circle_grid_gray(&spec);
        let blobs = find_blobs(&img, &BlobConfig::default());
        let bright: Vec<_> = blobs.iter().filter(|b| b.repeats >= 2).collect();
        assert_eq!(bright.len(), spec.rows * spec.cols);
        for b in bright {
            assert!((b.diameter() - 2.0 * spec.radius as f64).abs() < 4.0);
        }
    }

    #[test]
    fn whole_frame_region_is_ignored() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([200]));
        img.put_pixel(0, 0, Luma([10]));
        assert!(find_blobs(&img, &BlobConfig::default()).is_empty());
    }

    #[test]
    fn single_level_region_is_not_repeated() {
        let mut img = GrayImage::from_pixel(80, 80, Luma([0]));
        imageproc::drawing::draw_filled_circle_mut(&mut img, (40, 40), 10, Luma([55]));
        let cfg = BlobConfig::default();
        // Only the level 50 binarization separates the disk.
        assert!(find_blobs(&img, &cfg).iter().all(|b| !(b.x > 30.0 && b.x < 50.0)));
    }
}
