//! High-level moderation API.
//!
//! [`Moderator`] owns one immutable [`ModerationConfig`] and the body-part
//! backend. Create it once and share it across requests; it is `Send + Sync`.
//!
//! # Examples
//!
//! ```no_run
//! use safelens::Moderator;
//!
//! let moderator = Moderator::new(Default::default());
//! let bytes = std::fs::read("upload.jpg").unwrap();
//! let verdict = moderator.moderate(&bytes, "upload.jpg");
//! println!("safe = {}", verdict.safe);
//! ```

use image::RgbImage;

use crate::config::ModerationConfig;
use crate::error::ModerationError;
use crate::features::nudity::{BodyPartDetector, NoPartsDetector};
use crate::features::CategoryRawSignals;
use crate::pipeline::{self, AnalysisReport, Backends, ModerationVerdict};
use crate::Category;

/// Availability of one category backend, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    Ready { backend: String },
    Unavailable { reason: String },
}

/// Primary moderation interface.
pub struct Moderator {
    config: ModerationConfig,
    nudity: Result<Box<dyn BodyPartDetector>, String>,
    drugs: Result<(), String>,
}

impl std::fmt::Debug for Moderator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Moderator")
            .field("nudity", &self.backend_status(Category::Nudity))
            .field("drugs", &self.backend_status(Category::Drugs))
            .finish_non_exhaustive()
    }
}

impl Moderator {
    /// Moderator without a body-part model; nudity uses the skin backup.
    pub fn new(config: ModerationConfig) -> Self {
        Self::with_parts_detector(config, Ok(Box::new(NoPartsDetector)))
    }

    /// Moderator with an explicit body-part backend.
    ///
    /// A backend that failed to initialize, or a category whose configuration
    /// does not validate, leaves that category in fallback mode; the other
    /// category is unaffected.
    pub fn with_parts_detector(
        config: ModerationConfig,
        detector: Result<Box<dyn BodyPartDetector>, ModerationError>,
    ) -> Self {
        let nudity = config
            .validate_category(Category::Nudity)
            .and(detector)
            .map_err(|e| e.to_string());
        let drugs = config
            .validate_category(Category::Drugs)
            .map_err(|e| e.to_string());

        match &nudity {
            Ok(d) => tracing::info!(backend = d.name(), "nudity backend ready"),
            Err(reason) => tracing::warn!(reason = %reason, "nudity backend unavailable"),
        }
        if let Err(reason) = &drugs {
            tracing::warn!(reason = %reason, "drugs backend unavailable");
        }
        Self {
            config,
            nudity,
            drugs,
        }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn backend_status(&self, category: Category) -> BackendStatus {
        let unavailable = |reason: &String| BackendStatus::Unavailable {
            reason: reason.clone(),
        };
        match category {
            Category::Nudity => match &self.nudity {
                Ok(d) => BackendStatus::Ready {
                    backend: d.name().to_string(),
                },
                Err(reason) => unavailable(reason),
            },
            Category::Drugs => match &self.drugs {
                Ok(()) => BackendStatus::Ready {
                    backend: "heuristic".to_string(),
                },
                Err(reason) => unavailable(reason),
            },
        }
    }

    fn backends(&self) -> Backends<'_> {
        Backends {
            nudity: self
                .nudity
                .as_ref()
                .map(|d| &**d)
                .map_err(String::as_str),
            drugs: self.drugs.as_ref().map(|_| ()).map_err(String::as_str),
        }
    }

    /// Moderate encoded image bytes. Always returns a well-formed verdict.
    pub fn moderate(&self, bytes: &[u8], filename: &str) -> ModerationVerdict {
        self.moderate_detailed(bytes, filename).verdict
    }

    /// Moderate encoded image bytes and keep the per-category analysis.
    pub fn moderate_detailed(&self, bytes: &[u8], filename: &str) -> AnalysisReport {
        let report = pipeline::analyze_bytes(bytes, filename, self.backends(), &self.config);
        log_summary(&report);
        report
    }

    /// Moderate an already decoded image.
    pub fn moderate_image(&self, image: &RgbImage, filename: &str) -> AnalysisReport {
        let report = pipeline::analyze_guarded(image, filename, self.backends(), &self.config);
        log_summary(&report);
        report
    }

    /// Raw (pre-context, pre-fusion) signals for one category.
    pub fn classify_category(&self, image: &RgbImage, category: Category) -> CategoryRawSignals {
        pipeline::classify_category(image, category, self.backends(), &self.config)
    }
}

fn log_summary(report: &AnalysisReport) {
    let v = &report.verdict;
    tracing::info!(
        filename = %v.filename,
        safe = v.safe,
        state = ?report.state,
        nudity = v.confidence(Category::Nudity).unwrap_or(0.0),
        drugs = v.confidence(Category::Drugs).unwrap_or(0.0),
        overall = v.overall_confidence,
        "moderation complete"
    );
}
