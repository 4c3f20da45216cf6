//! Paraphernalia indicator group: pipes, scales, syringes and containers.
//!
//! The group value is the strongest single indicator.

use image::GrayImage;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};

use super::step::{Bound, Step, StepTable};
use super::{combine_max, run_extractor, ExtractorError, RawSignal};
use crate::raster::{shapes, Frame};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum Hough votes for a line.
    pub vote_threshold: u32,
    /// Hough non-maximum suppression radius.
    pub suppression_radius: u32,
    /// Shortest traced segment kept (pixels).
    pub min_segment_length: f32,
    /// Largest gap bridged while tracing (pixels).
    pub max_gap: u32,
    /// Segments longer than this are counted.
    pub long_segment: f32,
    pub score: StepTable,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 50,
            suppression_radius: 8,
            min_segment_length: 30.0,
            max_gap: 10,
            long_segment: 50.0,
            score: StepTable::new(Bound::AtLeast, vec![Step::new(2.0, 0.2, 0.1, 0.6)], 0.0),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub min_area: f64,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub epsilon_frac: f64,
    pub vertices: usize,
    /// Bounding-box width/height range `(min, max)`, exclusive.
    pub aspect_range: [f64; 2],
    pub score: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            min_area: 1000.0,
            epsilon_frac: 0.02,
            vertices: 4,
            aspect_range: [1.2, 3.0],
            score: 0.7,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyringeConfig {
    /// Contour area range `(min, max)`, exclusive.
    pub area_range: [f64; 2],
    /// Long side / short side must exceed this.
    pub min_elongation: f64,
    pub score: f32,
}

impl Default for SyringeConfig {
    fn default() -> Self {
        Self {
            area_range: [200.0, 2000.0],
            min_elongation: 5.0,
            score: 0.8,
        }
    }
}

/// Paraphernalia group configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ParaphernaliaConfig {
    pub pipes: PipeConfig,
    pub scales: ScaleConfig,
    pub syringes: SyringeConfig,
    /// Canny thresholds for the scale and syringe contours.
    pub contour_canny: [f32; 2],
}

impl Default for ParaphernaliaConfig {
    fn default() -> Self {
        Self {
            pipes: PipeConfig::default(),
            scales: ScaleConfig::default(),
            syringes: SyringeConfig::default(),
            contour_canny: [50.0, 150.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Pipes
// ---------------------------------------------------------------------------

#[inline]
fn is_edge(edges: &GrayImage, x: i64, y: i64) -> bool {
    let (w, h) = edges.dimensions();
    x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && edges.get_pixel(x as u32, y as u32)[0] > 0
}

/// Lengths of the edge runs along `line`, bridging gaps up to `max_gap`.
pub(crate) fn trace_segments(edges: &GrayImage, line: &PolarLine, max_gap: u32) -> Vec<f32> {
    let (w, h) = edges.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (c, s) = (theta.cos(), theta.sin());
    // Foot of the normal, then walk along the line direction.
    let (x0, y0) = (line.r * c, line.r * s);
    let (dx, dy) = (-s, c);
    let reach = (w as f32).hypot(h as f32).ceil() as i64 + 1;

    let mut lengths = Vec::new();
    let mut start: Option<i64> = None;
    let mut last_hit = 0i64;
    for t in -reach..=reach {
        let px = x0 + dx * t as f32;
        let py = y0 + dy * t as f32;
        let (xi, yi) = (px.round() as i64, py.round() as i64);
        // One pixel of tolerance across the line.
        let hit = is_edge(edges, xi, yi)
            || is_edge(edges, (px + c).round() as i64, (py + s).round() as i64)
            || is_edge(edges, (px - c).round() as i64, (py - s).round() as i64);
        if hit {
            if start.is_none() {
                start = Some(t);
            }
            last_hit = t;
        } else if let Some(s0) = start {
            if t - last_hit > max_gap as i64 {
                lengths.push((last_hit - s0) as f32);
                start = None;
            }
        }
    }
    if let Some(s0) = start {
        lengths.push((last_hit - s0) as f32);
    }
    lengths
}

pub(crate) fn pipe_score(frame: &Frame<'_>, config: &PipeConfig) -> Result<f32, ExtractorError> {
    let (w, h) = frame.dimensions();
    ExtractorError::require_side(w, h, 3)?;
    let edges = imageproc::edges::canny(frame.gray(), config.canny_low, config.canny_high);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: config.vote_threshold,
            suppression_radius: config.suppression_radius,
        },
    );
    let long = lines
        .iter()
        .flat_map(|line| trace_segments(&edges, line, config.max_gap))
        .filter(|&len| len >= config.min_segment_length && len > config.long_segment)
        .count();
    tracing::trace!(lines = lines.len(), long, "pipe segments");
    Ok(config.score.lookup_count(long))
}

// ---------------------------------------------------------------------------
// Scales and syringes
// ---------------------------------------------------------------------------

fn contour_shapes(frame: &Frame<'_>, config: &ParaphernaliaConfig) -> Vec<shapes::Shape> {
    let [lo, hi] = config.contour_canny;
    let edges = imageproc::edges::canny(frame.gray(), lo, hi);
    shapes::external_shapes(&edges)
}

pub(crate) fn scale_score(shapes: &[shapes::Shape], config: &ScaleConfig) -> f32 {
    let [lo, hi] = config.aspect_range;
    let found = shapes.iter().any(|s| {
        if s.area() <= config.min_area {
            return false;
        }
        let aspect = s.bounding_box().aspect();
        s.polygon_vertices(config.epsilon_frac) == config.vertices && aspect > lo && aspect < hi
    });
    if found {
        config.score
    } else {
        0.0
    }
}

pub(crate) fn syringe_score(shapes: &[shapes::Shape], config: &SyringeConfig) -> f32 {
    let [lo, hi] = config.area_range;
    let found = shapes.iter().any(|s| {
        s.area() > lo && s.area() < hi && s.bounding_box().elongation() > config.min_elongation
    });
    if found {
        config.score
    } else {
        0.0
    }
}

/// Run the paraphernalia extractors and combine them into the group value.
pub(crate) fn extract(frame: &Frame<'_>, config: &ParaphernaliaConfig) -> (f32, Vec<RawSignal>) {
    let (w, h) = frame.dimensions();
    let contours = ExtractorError::require_side(w, h, 3).map(|()| contour_shapes(frame, config));

    let components = vec![
        run_extractor("pipes", || pipe_score(frame, &config.pipes)),
        run_extractor("scales", || {
            contours
                .as_ref()
                .map(|c| scale_score(c, &config.scales))
                .map_err(Clone::clone)
        }),
        run_extractor("syringes", || {
            contours
                .as_ref()
                .map(|c| syringe_score(c, &config.syringes))
                .map_err(Clone::clone)
        }),
        // No container cue is implemented; the slot is still reported.
        run_extractor("containers", || Ok(0.0)),
    ];
    let value = combine_max(&components);
    (value, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn traced_horizontal_line_with_gap() {
        let mut edges = GrayImage::new(120, 40);
        for x in 10..50 {
            edges.put_pixel(x, 20, Luma([255]));
        }
        for x in 55..100 {
            edges.put_pixel(x, 20, Luma([255]));
        }
        // y = 20 has its normal along +y.
        let line = PolarLine {
            r: 20.0,
            angle_in_degrees: 90,
        };
        let segs = trace_segments(&edges, &line, 10);
        assert_eq!(segs.len(), 1);
        assert!((segs[0] - 89.0).abs() <= 1.0, "segment {}", segs[0]);

        let split = trace_segments(&edges, &line, 3);
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn trace_handles_very_wide_strip() {
        let mut edges = GrayImage::new(70_000, 4);
        for x in 100..400 {
            edges.put_pixel(x, 2, Luma([255]));
        }
        let line = PolarLine {
            r: 2.0,
            angle_in_degrees: 90,
        };
        let segs = trace_segments(&edges, &line, 10);
        assert_eq!(segs.len(), 1);
        assert!((segs[0] - 299.0).abs() <= 1.0, "segment {}", segs[0]);
    }

    #[test]
    fn thin_bar_reads_as_syringe() {
        let mut binary = GrayImage::new(160, 60);
        draw_filled_rect_mut(&mut binary, Rect::at(20, 25).of_size(100, 8), Luma([255]));
        let shapes = shapes::external_shapes(&binary);
        let cfg = ParaphernaliaConfig::default();
        assert_eq!(syringe_score(&shapes, &cfg.syringes), 0.8);
        assert_eq!(scale_score(&shapes, &cfg.scales), 0.0);
    }

    #[test]
    fn wide_box_reads_as_scale() {
        let mut binary = GrayImage::new(160, 100);
        draw_filled_rect_mut(&mut binary, Rect::at(20, 20).of_size(80, 40), Luma([255]));
        let shapes = shapes::external_shapes(&binary);
        let cfg = ParaphernaliaConfig::default();
        assert_eq!(scale_score(&shapes, &cfg.scales), 0.7);
        assert_eq!(syringe_score(&shapes, &cfg.syringes), 0.0);
    }

    #[test]
    fn long_straight_edges_count_as_pipes() {
        let mut img = RgbImage::from_pixel(200, 120, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut img, Rect::at(20, 30).of_size(160, 12), Rgb([230, 230, 230]));
        draw_filled_rect_mut(&mut img, Rect::at(20, 80).of_size(160, 12), Rgb([230, 230, 230]));
        let frame = Frame::new(&img);
        let (value, components) = extract(&frame, &ParaphernaliaConfig::default());
        assert_eq!(components.len(), 4);
        let pipes = components.iter().find(|c| c.method == "pipes").unwrap();
        assert!(pipes.value() >= 0.4, "pipes {}", pipes.value());
        assert!(value >= pipes.value());
    }

    #[test]
    fn containers_slot_is_always_zero() {
        let img = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        let (value, components) = extract(&Frame::new(&img), &ParaphernaliaConfig::default());
        assert_eq!(value, 0.0);
        assert!(components.iter().any(|c| c.method == "containers" && !c.is_failed()));
    }
}
