//! Circular-object (pill) detection.
//!
//! Candidates come from a gradient Hough search: Canny edge pixels vote along
//! their gradient direction for every radius in range, centers are accumulator
//! peaks and each center gets the radius with the best normalized edge
//! support. Candidates are then screened by intensity and shape tests that
//! reject skin patches, large solid structures and rough-edged blobs.

use image::GrayImage;

use super::step::{Bound, Step, StepTable};
use super::ExtractorError;
use crate::raster::filters;
use crate::raster::shapes;
use crate::raster::stats::disk_stats;
use crate::raster::Frame;

/// Hough search parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleSearchConfig {
    /// Gaussian pre-blur sigma.
    pub blur_sigma: f32,
    /// Smallest voted radius (pixels).
    pub min_radius: u32,
    /// Largest voted radius (pixels).
    pub max_radius: u32,
    /// Minimum distance between accepted centers (pixels).
    pub min_dist: f32,
    /// Canny high threshold; the low threshold is half of it.
    pub canny_high: f32,
    /// Minimum 3×3 accumulator support for a center and minimum edge support
    /// for its radius.
    pub accumulator_threshold: u32,
    /// Cap on centers kept after suppression.
    pub max_candidates: usize,
}

impl Default for CircleSearchConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 2.0,
            min_radius: 5,
            max_radius: 80,
            min_dist: 15.0,
            canny_high: 50.0,
            accumulator_threshold: 20,
            max_candidates: 1000,
        }
    }
}

/// Maximum interior standard deviation allowed above a mean level.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UniformityRule {
    pub mean_above: f64,
    pub max_std: f64,
}

/// Candidate screening parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleValidationConfig {
    /// Accepted radius range `[min, max]` (pixels).
    pub radius_range: [f32; 2],
    /// Interior statistics use a disk of `interior_fraction · r`.
    pub interior_fraction: f32,
    /// Skin cue: interior mean strictly inside this range.
    pub skin_mean_range: [f64; 2],
    /// Skin cue: interior std below this.
    pub skin_max_std: f64,
    /// Skin cue: radius above this.
    pub skin_min_radius: f32,
    /// Skin cue: |interior mean − 2r-disk mean| below this.
    pub skin_max_surround_diff: f64,
    /// Number of skin cues that rejects a candidate.
    pub skin_min_cues: usize,
    /// Binarization level for the structure test.
    pub structure_level: u8,
    /// Structure test: contour area above `factor · r²`.
    pub structure_area_factor: f64,
    /// Structure test: contour area / bounding-box area above this.
    pub structure_fill_ratio: f64,
    /// Structure test: bounding-box area above `factor · r²`.
    pub structure_bbox_factor: f64,
    /// Minimum interior mean intensity.
    pub min_interior_mean: f64,
    /// Points sampled on the circle for the edge test.
    pub edge_samples: usize,
    /// Gradient magnitude range `(lo, hi)` counted as a clean edge.
    pub edge_gradient_range: [f32; 2],
    /// Minimum fraction of clean edge samples.
    pub min_edge_smoothness: f32,
    /// Rules tried in order; the first with `mean > mean_above` applies.
    pub uniformity: Vec<UniformityRule>,
    /// Std limit when no uniformity rule applies.
    pub uniformity_default_max_std: f64,
}

impl Default for CircleValidationConfig {
    fn default() -> Self {
        Self {
            radius_range: [5.0, 50.0],
            interior_fraction: 1.0,
            skin_mean_range: [120.0, 200.0],
            skin_max_std: 25.0,
            skin_min_radius: 25.0,
            skin_max_surround_diff: 15.0,
            skin_min_cues: 3,
            structure_level: 127,
            structure_area_factor: 50.0,
            structure_fill_ratio: 0.9,
            structure_bbox_factor: 30.0,
            min_interior_mean: 20.0,
            edge_samples: 16,
            edge_gradient_range: [10.0, 100.0],
            min_edge_smoothness: 0.3,
            uniformity: vec![
                UniformityRule {
                    mean_above: 230.0,
                    max_std: 60.0,
                },
                UniformityRule {
                    mean_above: 180.0,
                    max_std: 50.0,
                },
            ],
            uniformity_default_max_std: 40.0,
        }
    }
}

/// Circular-object extractor configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleConfig {
    pub search: CircleSearchConfig,
    pub validation: CircleValidationConfig,
    /// Validated count → score. The fall-through applies when candidates
    /// exist but none validated.
    pub score: StepTable,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            search: CircleSearchConfig::default(),
            validation: CircleValidationConfig::default(),
            score: StepTable::new(
                Bound::AtLeast,
                vec![
                    Step::new(30.0, 0.8, 0.005, 0.98),
                    Step::new(20.0, 0.7, 0.01, 0.95),
                    Step::new(10.0, 0.6, 0.02, 0.90),
                    Step::new(5.0, 0.5, 0.05, 0.85),
                    Step::new(3.0, 0.4, 0.08, 0.75),
                    Step::new(1.0, 0.3, 0.15, 0.65),
                ],
                0.2,
            ),
        }
    }
}

/// A detected circle candidate.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// 3×3 accumulator support at the center.
    pub votes: u32,
}

/// Why a circle candidate was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CircleRejectReason {
    OutOfBounds,
    RadiusOutOfRange,
    SkinLike,
    SolidStructure,
    TooDark,
    RoughEdge,
    NonUniform,
}

impl CircleRejectReason {
    pub(crate) const fn code(self) -> &'static str {
        match self {
            Self::OutOfBounds => "out_of_bounds",
            Self::RadiusOutOfRange => "radius_out_of_range",
            Self::SkinLike => "skin_like",
            Self::SolidStructure => "solid_structure",
            Self::TooDark => "too_dark",
            Self::RoughEdge => "rough_edge",
            Self::NonUniform => "non_uniform",
        }
    }
}

impl std::fmt::Display for CircleRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Hough search
// ---------------------------------------------------------------------------

/// Locate circle candidates in a grayscale image.
///
/// Returns candidates sorted by accumulator support (highest first).
pub fn find_circles(gray: &GrayImage, config: &CircleSearchConfig) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 8 || h < 8 || config.max_radius < config.min_radius || config.min_radius == 0 {
        return Vec::new();
    }

    let blurred = filters::blur(gray, config.blur_sigma);
    let edges = imageproc::edges::canny(&blurred, config.canny_high * 0.5, config.canny_high);
    let gx = imageproc::gradients::horizontal_scharr(&blurred);
    let gy = imageproc::gradients::vertical_scharr(&blurred);
    let (gx_raw, gy_raw) = (gx.as_raw(), gy.as_raw());

    let stride = w as usize;
    let mut edge_points: Vec<(i32, i32)> = Vec::new();
    let mut accum = vec![0u32; stride * h as usize];

    for (idx, &e) in edges.as_raw().iter().enumerate() {
        if e == 0 {
            continue;
        }
        let x = (idx % stride) as i32;
        let y = (idx / stride) as i32;
        edge_points.push((x, y));

        let gxv = gx_raw[idx] as f32;
        let gyv = gy_raw[idx] as f32;
        let mag = (gxv * gxv + gyv * gyv).sqrt();
        if mag < 1e-6 {
            continue;
        }
        let (dx, dy) = (gxv / mag, gyv / mag);

        // Vote along +gradient and -gradient directions
        for r in config.min_radius..=config.max_radius {
            let r = r as f32;
            for sign in [1.0f32, -1.0] {
                let vx = (x as f32 + sign * dx * r).round();
                let vy = (y as f32 + sign * dy * r).round();
                if vx >= 0.0 && vy >= 0.0 && vx < w as f32 && vy < h as f32 {
                    accum[vy as usize * stride + vx as usize] += 1;
                }
            }
        }
    }
    if edge_points.is_empty() {
        return Vec::new();
    }

    // 3×3 support, then local maxima (ties broken by index)
    let support = box3_sum(&accum, w as usize, h as usize);
    let mut peaks: Vec<(usize, u32)> = Vec::new();
    for y in 1..h as usize - 1 {
        for x in 1..stride - 1 {
            let idx = y * stride + x;
            let val = support[idx];
            if val <= config.accumulator_threshold {
                continue;
            }
            let mut is_max = true;
            'nbr: for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    let nidx = ny * stride + nx;
                    if nidx == idx {
                        continue;
                    }
                    if support[nidx] > val || (support[nidx] == val && nidx < idx) {
                        is_max = false;
                        break 'nbr;
                    }
                }
            }
            if is_max {
                peaks.push((idx, val));
            }
        }
    }
    peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    // Greedy minimum-distance suppression
    let min_dist_sq = config.min_dist * config.min_dist;
    let mut centers: Vec<(f32, f32, u32)> = Vec::new();
    for (idx, votes) in peaks {
        let cx = (idx % stride) as f32;
        let cy = (idx / stride) as f32;
        let crowded = centers
            .iter()
            .any(|&(ox, oy, _)| (ox - cx).powi(2) + (oy - cy).powi(2) < min_dist_sq);
        if crowded {
            continue;
        }
        centers.push((cx, cy, votes));
        if centers.len() >= config.max_candidates {
            break;
        }
    }

    let circles: Vec<Circle> = centers
        .into_iter()
        .filter_map(|(x, y, votes)| {
            best_radius(&edge_points, x, y, config).map(|radius| Circle {
                x,
                y,
                radius,
                votes,
            })
        })
        .collect();
    tracing::trace!(
        edges = edge_points.len(),
        circles = circles.len(),
        "hough circle search"
    );
    circles
}

fn box3_sum(accum: &[u32], w: usize, h: usize) -> Vec<u32> {
    let mut out = vec![0u32; accum.len()];
    for y in 0..h {
        for x in 0..w {
            let mut s = 0u32;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    s += accum[ny * w + nx];
                }
            }
            out[y * w + x] = s;
        }
    }
    out
}

/// Radius with the best per-unit-length edge support around `(cx, cy)`.
fn best_radius(
    edge_points: &[(i32, i32)],
    cx: f32,
    cy: f32,
    config: &CircleSearchConfig,
) -> Option<f32> {
    let max_r = config.max_radius as usize;
    let mut hist = vec![0u32; max_r + 2];
    for &(x, y) in edge_points {
        let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        let bin = d.round() as usize;
        if bin <= max_r + 1 {
            hist[bin] += 1;
        }
    }

    let mut best: Option<(f32, f32)> = None;
    for r in config.min_radius as usize..=max_r {
        let support = hist[r - 1] + hist[r] + hist[r + 1];
        if support < config.accumulator_threshold {
            continue;
        }
        let normalized = support as f32 / r as f32;
        if best.map_or(true, |(_, n)| normalized > n) {
            best = Some((r as f32, normalized));
        }
    }
    best.map(|(r, _)| r)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Screen one candidate; `Ok(())` when it counts as a pill-like object.
pub(crate) fn validate_circle(
    gray: &GrayImage,
    circle: &Circle,
    config: &CircleValidationConfig,
) -> Result<(), CircleRejectReason> {
    let (w, h) = gray.dimensions();
    let Circle { x, y, radius: r, .. } = *circle;

    if x - r < 0.0 || y - r < 0.0 || x + r >= w as f32 || y + r >= h as f32 {
        return Err(CircleRejectReason::OutOfBounds);
    }
    if r < config.radius_range[0] || r > config.radius_range[1] {
        return Err(CircleRejectReason::RadiusOutOfRange);
    }

    let interior = disk_stats(gray, x, y, (r * config.interior_fraction).max(1.0));
    let surround = disk_stats(gray, x, y, 2.0 * r);

    let skin_cues = [
        interior.mean > config.skin_mean_range[0] && interior.mean < config.skin_mean_range[1],
        interior.std < config.skin_max_std,
        r > config.skin_min_radius,
        (interior.mean - surround.mean).abs() < config.skin_max_surround_diff,
    ];
    if skin_cues.iter().filter(|&&c| c).count() >= config.skin_min_cues {
        return Err(CircleRejectReason::SkinLike);
    }

    if has_solid_structure(gray, circle, config) {
        return Err(CircleRejectReason::SolidStructure);
    }
    if interior.mean < config.min_interior_mean {
        return Err(CircleRejectReason::TooDark);
    }
    if edge_smoothness(gray, circle, config) < config.min_edge_smoothness {
        return Err(CircleRejectReason::RoughEdge);
    }

    let max_std = config
        .uniformity
        .iter()
        .find(|rule| interior.mean > rule.mean_above)
        .map_or(config.uniformity_default_max_std, |rule| rule.max_std);
    if interior.std >= max_std {
        return Err(CircleRejectReason::NonUniform);
    }
    Ok(())
}

/// Large filled rectangular regions around the candidate (handles, blades,
/// furniture) rather than an isolated round object.
fn has_solid_structure(gray: &GrayImage, circle: &Circle, config: &CircleValidationConfig) -> bool {
    let (w, h) = gray.dimensions();
    let reach = 2.0 * circle.radius;
    let x0 = (circle.x - reach).max(0.0) as u32;
    let y0 = (circle.y - reach).max(0.0) as u32;
    let x1 = ((circle.x + reach).ceil() as u32).min(w);
    let y1 = ((circle.y + reach).ceil() as u32).min(h);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    let roi = image::imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
    let binary = filters::threshold_above(&roi, config.structure_level);

    let r2 = (circle.radius * circle.radius) as f64;
    shapes::external_shapes(&binary).iter().any(|shape| {
        let area = shape.area();
        let bbox_area = shape.bounding_box().area();
        area > config.structure_area_factor * r2
            && bbox_area > 0.0
            && area / bbox_area > config.structure_fill_ratio
            && bbox_area > config.structure_bbox_factor * r2
    })
}

/// Fraction of points on the circle whose gradient magnitude looks like a
/// clean object boundary.
fn edge_smoothness(gray: &GrayImage, circle: &Circle, config: &CircleValidationConfig) -> f32 {
    let (w, h) = gray.dimensions();
    let n = config.edge_samples.max(1);
    let [lo, hi] = config.edge_gradient_range;
    let at = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f32;

    let mut clean = 0usize;
    for i in 0..n {
        let theta = std::f32::consts::TAU * i as f32 / n as f32;
        let px = (circle.x + circle.radius * theta.cos()).round() as i64;
        let py = (circle.y + circle.radius * theta.sin()).round() as i64;
        if px < 1 || py < 1 || px >= w as i64 - 1 || py >= h as i64 - 1 {
            continue;
        }
        let (px, py) = (px as u32, py as u32);
        let gx = at(px + 1, py) - at(px - 1, py);
        let gy = at(px, py + 1) - at(px, py - 1);
        let mag = (gx * gx + gy * gy).sqrt();
        if mag > lo && mag < hi {
            clean += 1;
        }
    }
    clean as f32 / n as f32
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Circular-object score for one image.
pub(crate) fn circle_score(frame: &Frame<'_>, config: &CircleConfig) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 8)?;

    let candidates = find_circles(frame.gray(), &config.search);
    if candidates.is_empty() {
        return Ok(0.0);
    }

    let mut validated = 0usize;
    for circle in &candidates {
        match validate_circle(frame.gray(), circle, &config.validation) {
            Ok(()) => validated += 1,
            Err(reason) => {
                tracing::trace!(
                    x = circle.x,
                    y = circle.y,
                    r = circle.radius,
                    reason = reason.code(),
                    "circle rejected"
                );
            }
        }
    }
    tracing::debug!(
        candidates = candidates.len(),
        validated,
        "circle validation"
    );
    Ok(config.score.lookup_count(validated))
}
