//! safelens — heuristic image content-safety classifier.
//!
//! Images are scored per content category (exposed-body imagery and
//! drug-related imagery) by combining independent hand-engineered visual
//! cues. The pipeline stages are:
//!
//! 1. **Decode** – encoded bytes to an RGB raster.
//! 2. **Gate** – flat, low-information images short-circuit to a near-zero
//!    score.
//! 3. **Extract** – per-category cue extractors emit tagged raw signals
//!    (circles, blobs, colors and shapes for pills; texture, color and grain
//!    for powder; vegetation cues; paraphernalia outlines; body parts or skin
//!    coverage for nudity).
//! 4. **Context** – skin-dominated images suppress drug signals.
//! 5. **Fuse** – weighted sum, tiered boosting ladder and a ceiling.
//! 6. **Decide** – strict per-category thresholds and the aggregate verdict.
//!
//! # Public API
//! - [`Moderator`] as the primary entry point
//! - [`ModerationConfig`] for tuning every numeric parameter
//! - [`BodyPartDetector`] to plug in an external body-part model
//! - [`fuse`] and [`FusionProfile`] as the pure fusion stage

mod api;
mod category;
mod config;
mod context;
mod decision;
mod error;
pub mod features;
mod fusion;
mod pipeline;
mod raster;

#[cfg(test)]
mod test_utils;

pub use api::{BackendStatus, Moderator};
pub use category::Category;
pub use config::{DrugsConfig, ModerationConfig, NudityCategoryConfig};
pub use context::{BodyContext, ContextConfig, ImageComplexity, SimpleImageConfig};
pub use decision::{overall_confidence, Thresholds};
pub use error::ModerationError;
pub use features::circles::{find_circles, Circle, CircleSearchConfig};
pub use features::nudity::{
    BodyPartDetector, NoPartsDetector, NudityPath, PartDetection, PartSummary,
    PrecomputedPartsDetector,
};
pub use features::step::{Bound, Step, StepTable};
pub use features::{CategoryRawSignals, ExtractorError, RawSignal, SignalOutcome};
pub use fusion::{
    fuse, fuse_detailed, BoostRule, FusionBreakdown, FusionProfile, SignalWeight, TierBounds,
    TierCounts,
};
pub use pipeline::{
    AnalysisMethod, AnalysisReport, AnalysisState, CategoryAnalysis, CategoryDiagnostics,
    CategoryResult, DrugDiagnostics, GroupDiagnostic, ModerationVerdict, NudityDiagnostics,
};
pub use raster::{decode_rgb, ColorRange};
