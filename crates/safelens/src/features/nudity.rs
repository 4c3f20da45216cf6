//! Exposed-body detection.
//!
//! The primary path asks a [`BodyPartDetector`] backend for labelled body-part
//! detections. When it reports no exposed part (or fails on the image) a
//! skin-coverage heuristic provides a backup score.

use std::path::Path;

use image::RgbImage;

use super::{run_extractor, ExtractorError, RawSignal};
use crate::error::ModerationError;
use crate::raster::color::{fraction_in_any, ColorRange};
use crate::raster::Frame;
use crate::Category;

/// One labelled detection from a body-part backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartDetection {
    /// Backend class label, e.g. `BELLY_EXPOSED`.
    pub class: String,
    pub score: f32,
    /// Optional `[x, y, width, height]` box.
    #[serde(default, rename = "box", skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
}

/// Body-part detector backend.
///
/// Implementations are shared read-only across requests.
pub trait BodyPartDetector: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &str;

    /// Labelled detections for one image.
    fn detect(&self, image: &RgbImage) -> Result<Vec<PartDetection>, ExtractorError>;
}

/// Backend that never reports a part; nudity always takes the skin backup.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPartsDetector;

impl BodyPartDetector for NoPartsDetector {
    fn name(&self) -> &str {
        "none"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<PartDetection>, ExtractorError> {
        Ok(Vec::new())
    }
}

/// Backend replaying detections produced offline by an external model.
///
/// The same detections are returned for every image, so one instance
/// describes one image.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedPartsDetector {
    detections: Vec<PartDetection>,
}

impl PrecomputedPartsDetector {
    pub fn new(detections: Vec<PartDetection>) -> Self {
        Self { detections }
    }

    /// Load a JSON array of `{"class", "score", "box"?}` objects.
    ///
    /// A missing or malformed file means the nudity backend is unavailable.
    pub fn from_json_file(path: &Path) -> Result<Self, ModerationError> {
        let unavailable = |reason: String| ModerationError::BackendUnavailable {
            category: Category::Nudity,
            reason,
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| unavailable(ModerationError::io(path, e).to_string()))?;
        let detections: Vec<PartDetection> = serde_json::from_str(&text)
            .map_err(|e| unavailable(ModerationError::json(path, e).to_string()))?;
        if let Some(bad) = detections.iter().find(|d| !d.score.is_finite()) {
            return Err(unavailable(format!(
                "non-finite score for class {}",
                bad.class
            )));
        }
        Ok(Self { detections })
    }

    pub fn detections(&self) -> &[PartDetection] {
        &self.detections
    }
}

impl BodyPartDetector for PrecomputedPartsDetector {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<PartDetection>, ExtractorError> {
        Ok(self.detections.clone())
    }
}

/// Body-part aggregation parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BodyPartConfig {
    pub exposed_classes: Vec<String>,
    pub covered_classes: Vec<String>,
    /// Detections at or below this score are ignored.
    pub min_part_score: f32,
    /// Relative boost per exposed part beyond the first.
    pub boost_per_extra_part: f32,
}

impl Default for BodyPartConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            exposed_classes: owned(&[
                "EXPOSED_ANUS",
                "ARMPITS_EXPOSED",
                "BELLY_EXPOSED",
                "FEMALE_BREAST_EXPOSED",
                "MALE_BREAST_EXPOSED",
                "BUTTOCKS_EXPOSED",
                "FEMALE_GENITALIA_EXPOSED",
                "MALE_GENITALIA_EXPOSED",
                "THIGHS_EXPOSED",
            ]),
            covered_classes: owned(&[
                "FEMALE_BREAST_COVERED",
                "MALE_BREAST_COVERED",
                "BUTTOCKS_COVERED",
                "FEMALE_GENITALIA_COVERED",
                "MALE_GENITALIA_COVERED",
                "FACE_FEMALE",
                "FACE_MALE",
                "HAND",
                "FOOT_EXPOSED",
                "ARM",
                "LEG",
            ]),
            min_part_score: 0.25,
            boost_per_extra_part: 0.1,
        }
    }
}

/// Skin-coverage backup parameters (RGB ranges).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SkinBackupConfig {
    pub ranges: Vec<ColorRange>,
    /// Ratio above which the aspect boost is considered.
    pub aspect_boost_min_ratio: f32,
    /// Portrait aspect (height / width) range and its multiplier.
    pub portrait_aspect: [f32; 2],
    pub portrait_boost: f32,
    /// Landscape aspect range and its multiplier.
    pub landscape_aspect: [f32; 2],
    pub landscape_boost: f32,
    /// Above this ratio the score is the ratio capped at `high_cap`.
    pub high_ratio: f32,
    pub high_cap: f32,
    /// Below `high_ratio` the ratio is scaled by this.
    pub low_scale: f32,
}

impl Default for SkinBackupConfig {
    fn default() -> Self {
        Self {
            ranges: vec![
                // light
                ColorRange::new([180, 120, 90], [255, 200, 170]),
                // medium
                ColorRange::new([120, 80, 50], [200, 150, 120]),
                // dark
                ColorRange::new([80, 50, 30], [150, 100, 80]),
                // pink
                ColorRange::new([200, 150, 140], [255, 220, 200]),
            ],
            aspect_boost_min_ratio: 0.3,
            portrait_aspect: [1.2, 2.5],
            portrait_boost: 1.3,
            landscape_aspect: [0.4, 0.8],
            landscape_boost: 1.1,
            high_ratio: 0.4,
            high_cap: 0.8,
            low_scale: 0.5,
        }
    }
}

/// Nudity detector configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NudityConfig {
    pub parts: BodyPartConfig,
    pub skin_backup: SkinBackupConfig,
}

/// Summary of the body-part path for one image.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartSummary {
    pub total_detections: usize,
    pub exposed_parts: usize,
    pub covered_parts: usize,
    /// Mean score of the counted exposed parts (0 when none).
    pub average_part_score: f32,
    /// Boosted body-part score (0 when no exposed part).
    pub boosted: f32,
}

/// Aggregate backend detections into a body-part score.
pub fn summarize_parts(detections: &[PartDetection], config: &BodyPartConfig) -> PartSummary {
    let mut exposed = Vec::new();
    let mut covered_parts = 0usize;
    for d in detections {
        if d.score <= config.min_part_score {
            continue;
        }
        if config.exposed_classes.iter().any(|c| *c == d.class) {
            exposed.push(d.score);
        } else if config.covered_classes.iter().any(|c| *c == d.class) {
            covered_parts += 1;
        }
    }
    let n = exposed.len();
    let average_part_score = if n == 0 {
        0.0
    } else {
        exposed.iter().sum::<f32>() / n as f32
    };
    let boosted = if n == 0 {
        0.0
    } else {
        (average_part_score * (1.0 + config.boost_per_extra_part * (n - 1) as f32)).min(1.0)
    };
    PartSummary {
        total_detections: detections.len(),
        exposed_parts: n,
        covered_parts,
        average_part_score,
        boosted,
    }
}

/// Skin-coverage score used when no exposed part was detected.
pub(crate) fn skin_backup_score(
    frame: &Frame<'_>,
    config: &SkinBackupConfig,
) -> Result<f32, ExtractorError> {
    let rgb = frame.rgb();
    let (w, h) = rgb.dimensions();
    ExtractorError::require_side(w, h, 1)?;

    let pixels: Vec<[u8; 3]> = rgb.pixels().map(|p| p.0).collect();
    let mut ratio = fraction_in_any(&pixels, &config.ranges);

    if ratio > config.aspect_boost_min_ratio {
        let aspect = h as f32 / w as f32;
        let [p_lo, p_hi] = config.portrait_aspect;
        let [l_lo, l_hi] = config.landscape_aspect;
        if (p_lo..=p_hi).contains(&aspect) {
            ratio *= config.portrait_boost;
        } else if (l_lo..=l_hi).contains(&aspect) {
            ratio *= config.landscape_boost;
        }
        ratio = ratio.min(1.0);
    }

    let score = if ratio > config.high_ratio {
        ratio.min(config.high_cap)
    } else {
        ratio * config.low_scale
    };
    tracing::debug!(ratio, score, "skin backup");
    Ok(score)
}

/// Path that produced the nudity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudityPath {
    Detector,
    SkinBackup,
}

/// Outputs of the nudity detector for one image.
#[derive(Debug, Clone)]
pub(crate) struct NudityOutcome {
    /// Single signal handed to fusion.
    pub signal: RawSignal,
    /// Body-part and backup component signals.
    pub components: Vec<RawSignal>,
    pub path: NudityPath,
    pub parts: PartSummary,
}

pub(crate) const BODY_PARTS: &str = "body_parts";
pub(crate) const SKIN_BACKUP: &str = "skin_backup";

/// Run the body-part backend and, when it finds nothing exposed, the skin
/// backup.
pub(crate) fn extract(
    frame: &Frame<'_>,
    detector: &dyn BodyPartDetector,
    config: &NudityConfig,
) -> NudityOutcome {
    let mut parts = PartSummary::default();
    let primary = run_extractor(BODY_PARTS, || {
        let detections = detector.detect(frame.rgb())?;
        parts = summarize_parts(&detections, &config.parts);
        Ok(parts.boosted)
    });
    tracing::debug!(
        backend = detector.name(),
        exposed = parts.exposed_parts,
        covered = parts.covered_parts,
        "body-part detections"
    );

    if parts.exposed_parts > 0 {
        return NudityOutcome {
            signal: primary.clone(),
            components: vec![primary],
            path: NudityPath::Detector,
            parts,
        };
    }

    let backup = run_extractor(SKIN_BACKUP, || skin_backup_score(frame, &config.skin_backup));
    NudityOutcome {
        signal: backup.clone(),
        components: vec![primary, backup],
        path: NudityPath::SkinBackup,
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    fn part(class: &str, score: f32) -> PartDetection {
        PartDetection {
            class: class.to_string(),
            score,
            bbox: None,
        }
    }

    struct FailingDetector;

    impl BodyPartDetector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _image: &RgbImage) -> Result<Vec<PartDetection>, ExtractorError> {
            Err(ExtractorError::Backend {
                message: "model crashed".to_string(),
            })
        }
    }

    #[test]
    fn exposed_parts_are_averaged_and_boosted() {
        let dets = vec![
            part("BELLY_EXPOSED", 0.6),
            part("THIGHS_EXPOSED", 0.4),
            part("FACE_FEMALE", 0.9),
            part("ARMPITS_EXPOSED", 0.2),
        ];
        let s = summarize_parts(&dets, &BodyPartConfig::default());
        assert_eq!(s.exposed_parts, 2);
        assert_eq!(s.covered_parts, 1);
        assert_relative_eq!(s.average_part_score, 0.5);
        assert_relative_eq!(s.boosted, 0.55, epsilon = 1e-6);
    }

    #[test]
    fn portrait_skin_half_frame_is_boosted() {
        let mut img = RgbImage::from_pixel(100, 150, Rgb([0, 0, 0]));
        for y in 0..75 {
            for x in 0..100 {
                img.put_pixel(x, y, Rgb([190, 130, 100]));
            }
        }
        let frame = Frame::new(&img);
        let out = extract(&frame, &NoPartsDetector, &NudityConfig::default());
        assert_eq!(out.path, NudityPath::SkinBackup);
        assert_relative_eq!(out.signal.value(), 0.65, epsilon = 1e-6);
    }

    #[test]
    fn failed_backend_falls_through_to_backup() {
        let img = RgbImage::from_pixel(40, 40, Rgb([10, 10, 10]));
        let frame = Frame::new(&img);
        let out = extract(&frame, &FailingDetector, &NudityConfig::default());
        assert_eq!(out.path, NudityPath::SkinBackup);
        assert!(out.components[0].is_failed());
        assert_eq!(out.signal.method, SKIN_BACKUP);
        assert_eq!(out.signal.value(), 0.0);
    }

    #[test]
    fn detector_path_skips_backup() {
        let img = RgbImage::from_pixel(40, 40, Rgb([190, 130, 100]));
        let frame = Frame::new(&img);
        let detector = PrecomputedPartsDetector::new(vec![part("BUTTOCKS_EXPOSED", 0.7)]);
        let out = extract(&frame, &detector, &NudityConfig::default());
        assert_eq!(out.path, NudityPath::Detector);
        assert_eq!(out.components.len(), 1);
        assert_relative_eq!(out.signal.value(), 0.7);
    }

    #[test]
    fn missing_sidecar_is_backend_unavailable() {
        let err = PrecomputedPartsDetector::from_json_file(Path::new("/nonexistent/parts.json"))
            .unwrap_err();
        assert!(matches!(
            err,
            ModerationError::BackendUnavailable {
                category: Category::Nudity,
                ..
            }
        ));
    }

    #[test]
    fn sidecar_json_shape() {
        let json = r#"[{"class": "BELLY_EXPOSED", "score": 0.8, "box": [1, 2, 3, 4]}]"#;
        let dets: Vec<PartDetection> = serde_json::from_str(json).unwrap();
        assert_eq!(dets[0].bbox, Some([1.0, 2.0, 3.0, 4.0]));
    }
}
