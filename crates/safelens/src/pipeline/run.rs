//! Orchestrator: decode → gate → per-category extraction → context
//! correction → fusion → thresholds.

use std::panic::{self, AssertUnwindSafe};

use image::RgbImage;

use super::result::*;
use crate::config::ModerationConfig;
use crate::context::{BodyContext, ImageComplexity};
use crate::features::nudity::{self, BodyPartDetector, NudityPath};
use crate::features::{
    panic_message, paraphernalia, pills, plants, powder, CategoryRawSignals, ExtractorError,
    RawSignal,
};
use crate::fusion::fuse_detailed;
use crate::raster::{decode_rgb, Frame};
use crate::Category;

/// Confidence assigned to every category of a conservative verdict.
pub(crate) const CONSERVATIVE_CONFIDENCE: f32 = 1.0;

pub(crate) const DRUG_GROUPS: [&str; 4] = ["pills", "powder", "plants", "paraphernalia"];

/// Per-category backend availability, decided once at startup.
#[derive(Clone, Copy)]
pub(crate) struct Backends<'a> {
    pub nudity: Result<&'a dyn BodyPartDetector, &'a str>,
    pub drugs: Result<(), &'a str>,
}

// ---------------------------------------------------------------------------
// Raw signals
// ---------------------------------------------------------------------------

/// Drug indicator groups (uncorrected) and their components.
pub(crate) fn drug_signals(frame: &Frame<'_>, config: &ModerationConfig) -> CategoryRawSignals {
    let d = &config.drugs;
    let (pills_v, mut components) = pills::extract(frame, &d.pills);
    let (powder_v, powder_c) = powder::extract(frame, &d.powder);
    let (plants_v, plants_c) = plants::extract(frame, &d.plants);
    let (para_v, para_c) = paraphernalia::extract(frame, &d.paraphernalia);
    components.extend(powder_c);
    components.extend(plants_c);
    components.extend(para_c);

    let signals = DRUG_GROUPS
        .iter()
        .zip([pills_v, powder_v, plants_v, para_v])
        .map(|(name, v)| RawSignal::score(*name, v))
        .collect();
    CategoryRawSignals {
        category: Category::Drugs,
        signals,
        components,
    }
}

fn nudity_signals(
    frame: &Frame<'_>,
    detector: &dyn BodyPartDetector,
    config: &ModerationConfig,
) -> (CategoryRawSignals, nudity::NudityOutcome) {
    let outcome = nudity::extract(frame, detector, &config.nudity.detector);
    let raw = CategoryRawSignals {
        category: Category::Nudity,
        signals: vec![outcome.signal.clone()],
        components: outcome.components.clone(),
    };
    (raw, outcome)
}

fn unavailable_signals(category: Category, reason: &str) -> CategoryRawSignals {
    CategoryRawSignals {
        category,
        signals: vec![RawSignal::failed(
            category.name(),
            ExtractorError::Backend {
                message: reason.to_string(),
            },
        )],
        components: Vec::new(),
    }
}

/// Raw signals for one category; never fails.
///
/// Drug signals are returned before body-context correction.
pub(crate) fn classify_category(
    image: &RgbImage,
    category: Category,
    backends: Backends<'_>,
    config: &ModerationConfig,
) -> CategoryRawSignals {
    let frame = Frame::new(image);
    match category {
        Category::Nudity => match backends.nudity {
            Ok(detector) => nudity_signals(&frame, detector, config).0,
            Err(reason) => unavailable_signals(category, reason),
        },
        Category::Drugs => match backends.drugs {
            Ok(()) => drug_signals(&frame, config),
            Err(reason) => unavailable_signals(category, reason),
        },
    }
}

// ---------------------------------------------------------------------------
// Category analyses
// ---------------------------------------------------------------------------

fn analyze_drugs(frame: &Frame<'_>, config: &ModerationConfig) -> CategoryAnalysis {
    let raw = drug_signals(frame, config);
    let context = BodyContext::analyze(frame, &config.context);
    let corrected = context.apply(&raw.signals, &config.context);
    let fusion = fuse_detailed(&corrected, &config.drugs.fusion);

    let groups: Vec<GroupDiagnostic> = raw
        .signals
        .iter()
        .zip(&corrected)
        .map(|(r, c)| GroupDiagnostic {
            name: r.method.clone(),
            raw: r.value(),
            corrected: c.value(),
            detected: c.value() > config.drugs.group_detected_level,
        })
        .collect();
    let primary_indicator = groups
        .iter()
        .filter(|g| g.corrected > 0.0)
        .fold(None::<&GroupDiagnostic>, |best, g| match best {
            Some(b) if b.corrected >= g.corrected => Some(b),
            _ => Some(g),
        })
        .map(|g| g.name.clone());

    tracing::debug!(
        pills = groups[0].corrected,
        powder = groups[1].corrected,
        plants = groups[2].corrected,
        paraphernalia = groups[3].corrected,
        multiplier = fusion.multiplier,
        confidence = fusion.confidence,
        context_applied = context.likely_body,
        "drug fusion"
    );

    CategoryAnalysis {
        category: Category::Drugs,
        confidence: fusion.confidence,
        method: AnalysisMethod::Heuristic,
        state: AnalysisState::Completed,
        signals: corrected,
        components: raw.components,
        fusion: Some(fusion),
        diagnostics: Some(CategoryDiagnostics::Drugs(DrugDiagnostics {
            groups,
            primary_indicator,
            context,
            context_applied: context.likely_body,
        })),
        note: None,
    }
}

fn analyze_nudity(
    frame: &Frame<'_>,
    detector: &dyn BodyPartDetector,
    config: &ModerationConfig,
) -> CategoryAnalysis {
    let (raw, outcome) = nudity_signals(frame, detector, config);
    let fusion = fuse_detailed(&raw.signals, &config.nudity.fusion);
    let method = match outcome.path {
        NudityPath::Detector => AnalysisMethod::Detector,
        NudityPath::SkinBackup => AnalysisMethod::SkinBackup,
    };
    tracing::debug!(
        backend = detector.name(),
        path = method.tag(),
        confidence = fusion.confidence,
        "nudity fusion"
    );
    CategoryAnalysis {
        category: Category::Nudity,
        confidence: fusion.confidence,
        method,
        state: AnalysisState::Completed,
        signals: raw.signals,
        components: raw.components,
        fusion: Some(fusion),
        diagnostics: Some(CategoryDiagnostics::Nudity(NudityDiagnostics {
            backend: detector.name().to_string(),
            path: outcome.path,
            parts: outcome.parts,
        })),
        note: None,
    }
}

fn fallback_analysis(category: Category, reason: &str, config: &ModerationConfig) -> CategoryAnalysis {
    // Capped at the threshold so a fallback result is never flagged.
    let fallback = if config.fallback_confidence.is_nan() {
        0.0
    } else {
        config.fallback_confidence.clamp(0.0, 1.0)
    };
    let confidence = fallback.min(config.thresholds.for_category(category));
    tracing::warn!(%category, reason, "backend unavailable; using fallback analysis");
    CategoryAnalysis::fixed(
        category,
        confidence,
        AnalysisMethod::Fallback,
        AnalysisState::DegradedFallback,
        Some(reason.to_string()),
    )
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Score every category of a decoded image.
pub(crate) fn analyze_rgb(
    image: &RgbImage,
    filename: &str,
    backends: Backends<'_>,
    config: &ModerationConfig,
) -> AnalysisReport {
    let frame = Frame::new(image);
    let (w, h) = frame.dimensions();
    let complexity = ImageComplexity::measure(&frame, &config.simple_image);
    if complexity.is_simple {
        tracing::debug!(
            rgb_std = complexity.rgb_std,
            edge_density = complexity.edge_density,
            "simple image; extractors skipped"
        );
    }

    let simple = |category: Category| {
        CategoryAnalysis::fixed(
            category,
            config.simple_image.confidence,
            AnalysisMethod::SimpleImage,
            AnalysisState::Completed,
            None,
        )
    };
    let categories: Vec<CategoryAnalysis> = Category::ALL
        .iter()
        .map(|&category| match category {
            Category::Nudity => match backends.nudity {
                Err(reason) => fallback_analysis(category, reason, config),
                Ok(_) if complexity.is_simple => simple(category),
                Ok(detector) => analyze_nudity(&frame, detector, config),
            },
            Category::Drugs => match backends.drugs {
                Err(reason) => fallback_analysis(category, reason, config),
                Ok(()) if complexity.is_simple => simple(category),
                Ok(()) => analyze_drugs(&frame, config),
            },
        })
        .collect();

    AnalysisReport::from_analyses(
        filename,
        categories,
        &config.thresholds,
        Some([w, h]),
        Some(complexity),
        None,
    )
}

/// Verdict used when the image cannot be analyzed at all.
pub(crate) fn conservative_report(
    filename: &str,
    error: String,
    config: &ModerationConfig,
) -> AnalysisReport {
    tracing::warn!(filename, error = %error, "analysis failed; returning conservative verdict");
    let categories = Category::ALL
        .iter()
        .map(|&category| {
            CategoryAnalysis::fixed(
                category,
                CONSERVATIVE_CONFIDENCE,
                AnalysisMethod::Conservative,
                AnalysisState::ConservativeFailure,
                None,
            )
        })
        .collect();
    AnalysisReport::from_analyses(filename, categories, &config.thresholds, None, None, Some(error))
}

/// Decode and analyze; decode errors and panics yield a conservative report.
pub(crate) fn analyze_bytes(
    bytes: &[u8],
    filename: &str,
    backends: Backends<'_>,
    config: &ModerationConfig,
) -> AnalysisReport {
    let image = match decode_rgb(bytes) {
        Ok(image) => image,
        Err(e) => return conservative_report(filename, e.to_string(), config),
    };
    analyze_guarded(&image, filename, backends, config)
}

/// [`analyze_rgb`] with panics turned into a conservative report.
pub(crate) fn analyze_guarded(
    image: &RgbImage,
    filename: &str,
    backends: Backends<'_>,
    config: &ModerationConfig,
) -> AnalysisReport {
    match panic::catch_unwind(AssertUnwindSafe(|| analyze_rgb(image, filename, backends, config))) {
        Ok(report) => report,
        Err(payload) => conservative_report(
            filename,
            format!("pipeline panicked: {}", panic_message(payload.as_ref())),
            config,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::nudity::NoPartsDetector;
    use crate::test_utils::{circle_grid_rgb, CircleGridSpec};

    fn backends() -> Backends<'static> {
        Backends {
            nudity: Ok(&NoPartsDetector),
            drugs: Ok(()),
        }
    }

    #[test]
    fn pill_grid_is_strong_drug_evidence() {
        let img = circle_grid_rgb(&CircleGridSpec::default());
        let cfg = ModerationConfig::default();
        let report = analyze_rgb(&img, "grid.png", backends(), &cfg);
        let drugs = report.category(Category::Drugs).unwrap();
        assert_eq!(drugs.method, AnalysisMethod::Heuristic);
        let diag = drugs.drug_diagnostics().unwrap();
        assert!(!diag.context_applied);
        assert_eq!(diag.primary_indicator.as_deref(), Some("pills"));
        assert!(diag.group("pills").unwrap().detected);
        assert!(drugs.confidence > 0.8, "drugs {}", drugs.confidence);
        assert!(report.verdict.category(Category::Drugs).unwrap().flagged);
    }

    #[test]
    fn drug_groups_are_reported_in_order() {
        let img = circle_grid_rgb(&CircleGridSpec {
            rows: 2,
            cols: 2,
            ..CircleGridSpec::default()
        });
        let raw = classify_category(&img, Category::Drugs, backends(), &ModerationConfig::default());
        let names: Vec<&str> = raw.signals.iter().map(|s| s.method.as_str()).collect();
        assert_eq!(names, DRUG_GROUPS);
        assert_eq!(raw.components.len(), 4 + 3 + 3 + 4);
    }

    #[test]
    fn panicking_backend_falls_through_to_skin_backup() {
        struct Exploding;
        impl BodyPartDetector for Exploding {
            fn name(&self) -> &str {
                "exploding"
            }
            fn detect(
                &self,
                _image: &RgbImage,
            ) -> Result<Vec<crate::features::nudity::PartDetection>, ExtractorError> {
                panic!("backend bug")
            }
        }
        let img = circle_grid_rgb(&CircleGridSpec::default());
        let b = Backends {
            nudity: Ok(&Exploding),
            drugs: Ok(()),
        };
        let report = analyze_guarded(&img, "boom.png", b, &ModerationConfig::default());
        assert_eq!(report.state, AnalysisState::Completed);
        assert!(report.error.is_none());

        let nudity = report.category(Category::Nudity).unwrap();
        assert_eq!(nudity.method, AnalysisMethod::SkinBackup);
        assert_eq!(nudity.state, AnalysisState::Completed);
        let primary = &nudity.components[0];
        assert_eq!(primary.method, "body_parts");
        match &primary.outcome {
            crate::features::SignalOutcome::Failed { reason } => {
                assert_eq!(reason.code(), "panicked");
                assert!(reason.to_string().contains("backend bug"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(report.verdict.category(Category::Drugs).unwrap().flagged);
        assert!(!report.verdict.category(Category::Nudity).unwrap().flagged);
    }
}
