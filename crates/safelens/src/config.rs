//! Process-wide moderation configuration.
//!
//! Every numeric parameter of the pipeline lives here. Sections deserialize
//! with `#[serde(default)]`, so a JSON file only needs the fields it changes.

use std::path::Path;

use crate::context::{ContextConfig, SimpleImageConfig};
use crate::decision::Thresholds;
use crate::error::ModerationError;
use crate::features::nudity::NudityConfig;
use crate::features::paraphernalia::ParaphernaliaConfig;
use crate::features::pills::PillsConfig;
use crate::features::plants::PlantsConfig;
use crate::features::powder::PowderConfig;
use crate::features::step::StepTable;
use crate::fusion::FusionProfile;
use crate::raster::ColorRange;
use crate::Category;

/// Drug extractors and fusion profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DrugsConfig {
    pub pills: PillsConfig,
    pub powder: PowderConfig,
    pub plants: PlantsConfig,
    pub paraphernalia: ParaphernaliaConfig,
    pub fusion: FusionProfile,
    /// A group whose corrected value exceeds this is reported as detected.
    pub group_detected_level: f32,
}

impl Default for DrugsConfig {
    fn default() -> Self {
        Self {
            pills: PillsConfig::default(),
            powder: PowderConfig::default(),
            plants: PlantsConfig::default(),
            paraphernalia: ParaphernaliaConfig::default(),
            fusion: FusionProfile::drugs(),
            group_detected_level: 0.5,
        }
    }
}

/// Nudity detector and fusion profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NudityCategoryConfig {
    pub detector: NudityConfig,
    pub fusion: FusionProfile,
}

impl Default for NudityCategoryConfig {
    fn default() -> Self {
        Self {
            detector: NudityConfig::default(),
            fusion: FusionProfile::nudity(),
        }
    }
}

/// Top-level moderation configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub nudity: NudityCategoryConfig,
    pub drugs: DrugsConfig,
    /// Body-context suppression of drug indicators.
    pub context: ContextConfig,
    pub thresholds: Thresholds,
    pub simple_image: SimpleImageConfig,
    /// Confidence reported by a category whose backend is unavailable.
    pub fallback_confidence: f32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            nudity: NudityCategoryConfig::default(),
            drugs: DrugsConfig::default(),
            context: ContextConfig::default(),
            thresholds: Thresholds::default(),
            simple_image: SimpleImageConfig::default(),
            fallback_confidence: 0.05,
        }
    }
}

fn check(section: &str, result: Result<(), String>) -> Result<(), ModerationError> {
    result.map_err(|msg| ModerationError::InvalidConfig(format!("{section}: {msg}")))
}

fn check_table(section: &str, table: &StepTable) -> Result<(), ModerationError> {
    check(section, table.validate())
}

fn check_ranges(section: &str, ranges: &[ColorRange]) -> Result<(), ModerationError> {
    if ranges.iter().all(ColorRange::is_ordered) {
        Ok(())
    } else {
        check(section, Err("color range lower bound above upper bound".to_string()))
    }
}

fn check_unit(section: &str, name: &str, v: f32) -> Result<(), ModerationError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        check(section, Err(format!("{name} {v} outside [0, 1]")))
    }
}

fn check_weights(section: &str, weights: &[f32]) -> Result<(), ModerationError> {
    if weights.iter().all(|w| w.is_finite() && *w >= 0.0) {
        Ok(())
    } else {
        check(section, Err("weights must be finite and non-negative".to_string()))
    }
}

impl ModerationConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load a JSON file. The result is not validated.
    pub fn from_json_file(path: &Path) -> Result<Self, ModerationError> {
        let text = std::fs::read_to_string(path).map_err(|e| ModerationError::io(path, e))?;
        Self::from_json_str(&text).map_err(|e| ModerationError::json(path, e))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate the parameters one category depends on, including the
    /// fixed confidences every category can report.
    pub fn validate_category(&self, category: Category) -> Result<(), ModerationError> {
        check("thresholds", self.thresholds.validate_category(category))?;
        check_unit("root", "fallback_confidence", self.fallback_confidence)?;
        check_unit("simple_image", "confidence", self.simple_image.confidence)?;
        match category {
            Category::Nudity => self.validate_nudity(),
            Category::Drugs => self.validate_drugs(),
        }
    }

    /// Validate everything; the first problem is reported.
    pub fn validate(&self) -> Result<(), ModerationError> {
        for category in Category::ALL {
            self.validate_category(category)?;
        }
        Ok(())
    }

    fn validate_nudity(&self) -> Result<(), ModerationError> {
        let n = &self.nudity.detector;
        check_ranges("nudity.skin_backup", &n.skin_backup.ranges)?;
        check_unit("nudity.parts", "min_part_score", n.parts.min_part_score)?;
        check_unit("nudity.skin_backup", "high_cap", n.skin_backup.high_cap)?;
        check("nudity.fusion", self.nudity.fusion.validate())
    }

    fn validate_drugs(&self) -> Result<(), ModerationError> {
        let d = &self.drugs;

        let circles = &d.pills.circles;
        if circles.search.min_radius == 0 || circles.search.min_radius > circles.search.max_radius {
            return check(
                "drugs.pills.circles",
                Err("need 0 < min_radius <= max_radius".to_string()),
            );
        }
        check_table("drugs.pills.circles", &circles.score)?;
        let blobs = &d.pills.blobs;
        if blobs.threshold_step == 0 || blobs.min_threshold > blobs.max_threshold {
            return check(
                "drugs.pills.blobs",
                Err("need threshold_step > 0 and min_threshold <= max_threshold".to_string()),
            );
        }
        check_table("drugs.pills.blobs", &blobs.score)?;
        check_ranges("drugs.pills.colors", &d.pills.colors.ranges)?;
        check_table("drugs.pills.colors", &d.pills.colors.score)?;
        check_table("drugs.pills.shapes", &d.pills.shapes.score)?;
        check_weights("drugs.pills", &d.pills.weights)?;

        check_table("drugs.powder.texture", &d.powder.texture.smoothness)?;
        check_table("drugs.powder.texture", &d.powder.texture.brightness)?;
        check_ranges("drugs.powder.color", &d.powder.color.ranges)?;
        check_table("drugs.powder.color", &d.powder.color.score)?;
        check_table("drugs.powder.pattern", &d.powder.pattern.score)?;
        check_weights("drugs.powder", &d.powder.weights)?;

        check_ranges("drugs.plants.green", &d.plants.green.ranges)?;
        check_table("drugs.plants.green", &d.plants.green.score)?;
        check_table("drugs.plants.leaf", &d.plants.leaf.score)?;
        check_weights("drugs.plants", &d.plants.weights)?;

        check_table("drugs.paraphernalia.pipes", &d.paraphernalia.pipes.score)?;
        check_unit("drugs.paraphernalia.scales", "score", d.paraphernalia.scales.score)?;
        check_unit("drugs.paraphernalia.syringes", "score", d.paraphernalia.syringes.score)?;

        check_ranges("context", &self.context.skin_ranges)?;
        check_unit("context", "drug_penalty", self.context.drug_penalty)?;
        check("drugs.fusion", d.fusion.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ModerationConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = ModerationConfig::from_json_str(
            r#"{"thresholds": {"drugs": 0.7}, "context": {"drug_penalty": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(cfg.thresholds.drugs, 0.7);
        assert_eq!(cfg.thresholds.nudity, 0.3);
        assert_eq!(cfg.context.drug_penalty, 0.5);
        assert_eq!(cfg.drugs.fusion, FusionProfile::drugs());
    }

    #[test]
    fn json_roundtrip_of_defaults() {
        let json = ModerationConfig::default().to_json_pretty().unwrap();
        let back = ModerationConfig::from_json_str(&json).unwrap();
        assert_eq!(back.drugs.fusion, FusionProfile::drugs());
        assert_eq!(back.drugs.pills.circles.score, ModerationConfig::default().drugs.pills.circles.score);
    }

    #[test]
    fn invalid_drug_section_only_affects_drugs() {
        let mut cfg = ModerationConfig::default();
        cfg.drugs.pills.circles.search.min_radius = 0;
        assert!(matches!(
            cfg.validate_category(Category::Drugs),
            Err(ModerationError::InvalidConfig(_))
        ));
        assert!(cfg.validate_category(Category::Nudity).is_ok());
    }

    #[test]
    fn fixed_confidences_outside_unit_range_invalidate_both_categories() {
        let mut cfg = ModerationConfig::default();
        cfg.simple_image.confidence = 2.0;
        for category in Category::ALL {
            assert!(cfg.validate_category(category).is_err(), "{category}");
        }

        let mut cfg = ModerationConfig::default();
        cfg.fallback_confidence = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ModerationConfig::from_json_file(Path::new("/nonexistent/safelens.json")).unwrap_err();
        assert!(matches!(err, ModerationError::Io { .. }));
    }
}
