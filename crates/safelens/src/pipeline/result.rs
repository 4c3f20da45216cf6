//! Serializable moderation outcomes: the public verdict and the detailed
//! per-category analysis report behind it.

use chrono::{DateTime, Utc};

use crate::context::{BodyContext, ImageComplexity};
use crate::decision::{overall_confidence, Thresholds};
use crate::features::nudity::{NudityPath, PartSummary};
use crate::features::RawSignal;
use crate::fusion::FusionBreakdown;
use crate::Category;

/// Final confidence and flag for one category.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// `confidence > threshold(category)`.
    pub flagged: bool,
}

/// Moderation outcome for one image.
///
/// Always holds exactly one entry per category, in [`Category::ALL`] order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModerationVerdict {
    pub filename: String,
    /// No category is flagged.
    pub safe: bool,
    pub categories: Vec<CategoryResult>,
    /// Mean of the category confidences.
    pub overall_confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl ModerationVerdict {
    /// Build a verdict from per-category confidences, applying thresholds.
    ///
    /// Confidences are clamped to `[0, 1]`; NaN counts as `1.0`.
    pub fn from_confidences(
        filename: &str,
        confidences: &[(Category, f32)],
        thresholds: &Thresholds,
    ) -> Self {
        let categories: Vec<CategoryResult> = confidences
            .iter()
            .map(|&(category, confidence)| {
                let confidence = if confidence.is_nan() {
                    1.0
                } else {
                    confidence.clamp(0.0, 1.0)
                };
                CategoryResult {
                    category,
                    confidence,
                    flagged: thresholds.is_flagged(category, confidence),
                }
            })
            .collect();
        let values: Vec<f32> = categories.iter().map(|c| c.confidence).collect();
        Self {
            filename: filename.to_string(),
            safe: !categories.iter().any(|c| c.flagged),
            overall_confidence: overall_confidence(&values),
            categories,
            timestamp: Utc::now(),
        }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn confidence(&self, category: Category) -> Option<f32> {
        self.category(category).map(|c| c.confidence)
    }
}

/// Outcome of the moderation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    /// Every category pipeline ran.
    Completed,
    /// At least one category used the fixed fallback result.
    DegradedFallback,
    /// Decoding or the pipeline failed; everything is flagged.
    ConservativeFailure,
}

/// How a category confidence was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Drug indicator groups, context correction and fusion.
    Heuristic,
    /// Body-part detector backend.
    Detector,
    /// Skin-coverage backup after zero exposed detections.
    SkinBackup,
    /// Backend unavailable at startup.
    Fallback,
    /// Low-information image gate.
    SimpleImage,
    /// Decode or pipeline failure.
    Conservative,
}

impl AnalysisMethod {
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Detector => "detector",
            Self::SkinBackup => "skin_backup",
            Self::Fallback => "fallback",
            Self::SimpleImage => "simple_image",
            Self::Conservative => "conservative",
        }
    }
}

impl std::fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One drug indicator group before and after context correction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroupDiagnostic {
    pub name: String,
    pub raw: f32,
    pub corrected: f32,
    /// Corrected value exceeds the group detection level.
    pub detected: bool,
}

/// Drug analysis details.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DrugDiagnostics {
    pub groups: Vec<GroupDiagnostic>,
    /// Group with the highest corrected value, if any is non-zero.
    pub primary_indicator: Option<String>,
    pub context: BodyContext,
    pub context_applied: bool,
}

impl DrugDiagnostics {
    pub fn group(&self, name: &str) -> Option<&GroupDiagnostic> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Nudity analysis details.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NudityDiagnostics {
    pub backend: String,
    pub path: NudityPath,
    pub parts: PartSummary,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryDiagnostics {
    Drugs(DrugDiagnostics),
    Nudity(NudityDiagnostics),
}

/// Everything recorded while scoring one category.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategoryAnalysis {
    pub category: Category,
    pub confidence: f32,
    pub method: AnalysisMethod,
    pub state: AnalysisState,
    /// Signals handed to fusion (after context correction).
    pub signals: Vec<RawSignal>,
    /// Individual extractor outputs.
    pub components: Vec<RawSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<CategoryDiagnostics>,
    /// Why the category did not run normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CategoryAnalysis {
    /// Fixed-confidence analysis with no signals.
    pub(crate) fn fixed(
        category: Category,
        confidence: f32,
        method: AnalysisMethod,
        state: AnalysisState,
        note: Option<String>,
    ) -> Self {
        Self {
            category,
            confidence,
            method,
            state,
            signals: Vec::new(),
            components: Vec::new(),
            fusion: None,
            diagnostics: None,
            note,
        }
    }

    pub fn drug_diagnostics(&self) -> Option<&DrugDiagnostics> {
        match &self.diagnostics {
            Some(CategoryDiagnostics::Drugs(d)) => Some(d),
            _ => None,
        }
    }

    pub fn nudity_diagnostics(&self) -> Option<&NudityDiagnostics> {
        match &self.diagnostics {
            Some(CategoryDiagnostics::Nudity(d)) => Some(d),
            _ => None,
        }
    }
}

/// Verdict plus the per-category analysis behind it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisReport {
    pub verdict: ModerationVerdict,
    pub state: AnalysisState,
    /// `[width, height]` of the decoded image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ImageComplexity>,
    pub categories: Vec<CategoryAnalysis>,
    /// Failure description for a conservative verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisReport {
    pub fn category(&self, category: Category) -> Option<&CategoryAnalysis> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Assemble a report; the overall state is the worst category state.
    pub(crate) fn from_analyses(
        filename: &str,
        categories: Vec<CategoryAnalysis>,
        thresholds: &Thresholds,
        image_size: Option<[u32; 2]>,
        complexity: Option<ImageComplexity>,
        error: Option<String>,
    ) -> Self {
        let confidences: Vec<(Category, f32)> = categories
            .iter()
            .map(|c| (c.category, c.confidence))
            .collect();
        let state = categories
            .iter()
            .map(|c| c.state)
            .fold(AnalysisState::Completed, |acc, s| match (acc, s) {
                (AnalysisState::ConservativeFailure, _) | (_, AnalysisState::ConservativeFailure) => {
                    AnalysisState::ConservativeFailure
                }
                (AnalysisState::DegradedFallback, _) | (_, AnalysisState::DegradedFallback) => {
                    AnalysisState::DegradedFallback
                }
                _ => AnalysisState::Completed,
            });
        Self {
            verdict: ModerationVerdict::from_confidences(filename, &confidences, thresholds),
            state,
            image_size,
            complexity,
            categories,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_invariants() {
        let v = ModerationVerdict::from_confidences(
            "x.png",
            &[(Category::Nudity, 0.3), (Category::Drugs, 0.9)],
            &Thresholds::default(),
        );
        assert!(!v.safe);
        assert!(!v.category(Category::Nudity).unwrap().flagged);
        assert!(v.category(Category::Drugs).unwrap().flagged);
        approx::assert_relative_eq!(v.overall_confidence, 0.6);
    }

    #[test]
    fn confidences_are_clamped_to_unit_range() {
        let v = ModerationVerdict::from_confidences(
            "x.png",
            &[(Category::Nudity, 2.0), (Category::Drugs, f32::NAN)],
            &Thresholds::default(),
        );
        assert_eq!(v.confidence(Category::Nudity), Some(1.0));
        assert_eq!(v.confidence(Category::Drugs), Some(1.0));
        assert_eq!(v.overall_confidence, 1.0);

        let low = ModerationVerdict::from_confidences(
            "x.png",
            &[(Category::Nudity, -0.5), (Category::Drugs, 0.2)],
            &Thresholds::default(),
        );
        assert_eq!(low.confidence(Category::Nudity), Some(0.0));
        assert!(low.safe);
    }

    #[test]
    fn worst_state_wins() {
        let cats = vec![
            CategoryAnalysis::fixed(
                Category::Nudity,
                0.05,
                AnalysisMethod::Fallback,
                AnalysisState::DegradedFallback,
                None,
            ),
            CategoryAnalysis::fixed(
                Category::Drugs,
                0.01,
                AnalysisMethod::SimpleImage,
                AnalysisState::Completed,
                None,
            ),
        ];
        let r = AnalysisReport::from_analyses("a", cats, &Thresholds::default(), None, None, None);
        assert_eq!(r.state, AnalysisState::DegradedFallback);
        assert!(r.verdict.safe);
    }

    #[test]
    fn method_tags_match_serde() {
        let json = serde_json::to_string(&AnalysisMethod::SimpleImage).unwrap();
        assert_eq!(json, format!("\"{}\"", AnalysisMethod::SimpleImage));
    }
}
