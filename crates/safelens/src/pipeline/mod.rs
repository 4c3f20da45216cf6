//! Moderation pipeline.
//!
//! Stage order for one image: decode, simple-image gate, per-category raw
//! signals, body-context correction of drug signals, fusion, thresholds.
//! Backend failures at startup degrade a single category to a fixed fallback
//! result. A panicking extractor becomes one failed signal; a decode failure
//! or a panic outside the extractors yields a conservative verdict that flags
//! every category.

mod result;
mod run;

pub use result::{
    AnalysisMethod, AnalysisReport, AnalysisState, CategoryAnalysis, CategoryDiagnostics,
    CategoryResult, DrugDiagnostics, GroupDiagnostic, ModerationVerdict, NudityDiagnostics,
};

pub(crate) use run::{analyze_bytes, analyze_guarded, classify_category, Backends};
