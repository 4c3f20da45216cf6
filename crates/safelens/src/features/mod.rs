//! Hand-engineered visual cue extractors and the signals they emit.
//!
//! Each extractor inspects one [`Frame`](crate::raster::Frame) and produces a
//! score in `[0, 1]`. Extractors never abort a moderation: a failure is
//! recorded as [`SignalOutcome::Failed`] and counted as `0.0` downstream.

pub mod blobs;
pub mod circles;
pub mod nudity;
pub mod paraphernalia;
pub mod pills;
pub mod plants;
pub mod powder;
pub mod step;

use std::panic::{self, AssertUnwindSafe};

use crate::Category;

/// Why an extractor could not produce a score.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ExtractorError {
    /// The image is smaller than the extractor's neighbourhood.
    ImageTooSmall { width: u32, height: u32, min_side: u32 },
    /// The extractor produced NaN or infinity.
    NonFinite,
    /// An external detector backend failed on this image.
    Backend { message: String },
    /// The extractor panicked.
    Panicked { message: String },
}

impl ExtractorError {
    /// Stable snake_case reason code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ImageTooSmall { .. } => "image_too_small",
            Self::NonFinite => "non_finite",
            Self::Backend { .. } => "backend",
            Self::Panicked { .. } => "panicked",
        }
    }

    /// `Err(ImageTooSmall)` when either side is below `min_side`.
    pub(crate) fn require_side(width: u32, height: u32, min_side: u32) -> Result<(), Self> {
        if width < min_side || height < min_side {
            return Err(Self::ImageTooSmall {
                width,
                height,
                min_side,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ExtractorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageTooSmall {
                width,
                height,
                min_side,
            } => write!(
                f,
                "{}: {width}x{height} below minimum side {min_side}",
                self.code()
            ),
            Self::NonFinite => f.write_str(self.code()),
            Self::Backend { message } | Self::Panicked { message } => {
                write!(f, "{}: {message}", self.code())
            }
        }
    }
}

impl std::error::Error for ExtractorError {}

/// Tagged extractor result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalOutcome {
    Score { value: f32 },
    Failed { reason: ExtractorError },
}

/// One named cue value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawSignal {
    /// Extractor or indicator-group name.
    pub method: String,
    pub outcome: SignalOutcome,
}

impl RawSignal {
    pub fn score(method: impl Into<String>, value: f32) -> Self {
        Self {
            method: method.into(),
            outcome: SignalOutcome::Score {
                value: value.clamp(0.0, 1.0),
            },
        }
    }

    pub fn failed(method: impl Into<String>, reason: ExtractorError) -> Self {
        Self {
            method: method.into(),
            outcome: SignalOutcome::Failed { reason },
        }
    }

    /// Arithmetic value: the score, or `0.0` for a failed extractor.
    pub fn value(&self) -> f32 {
        match self.outcome {
            SignalOutcome::Score { value } => value,
            SignalOutcome::Failed { .. } => 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SignalOutcome::Failed { .. })
    }

    /// Same outcome tag with the score multiplied by `factor`.
    pub(crate) fn scaled(&self, factor: f32) -> Self {
        match self.outcome {
            SignalOutcome::Score { value } => Self::score(self.method.clone(), value * factor),
            SignalOutcome::Failed { .. } => self.clone(),
        }
    }
}

/// Every signal produced for one category of one image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategoryRawSignals {
    pub category: Category,
    /// Signals handed to fusion (indicator groups for drugs, the chosen path
    /// for nudity).
    pub signals: Vec<RawSignal>,
    /// Individual extractor outputs behind `signals`.
    pub components: Vec<RawSignal>,
}

impl CategoryRawSignals {
    pub fn signal(&self, method: &str) -> Option<&RawSignal> {
        self.signals.iter().find(|s| s.method == method)
    }

    pub fn component(&self, method: &str) -> Option<&RawSignal> {
        self.components.iter().find(|s| s.method == method)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one extractor and turn its result into a tagged signal.
///
/// A panic inside `extract` is caught and reported as
/// [`ExtractorError::Panicked`].
pub(crate) fn run_extractor<F>(method: &'static str, extract: F) -> RawSignal
where
    F: FnOnce() -> Result<f32, ExtractorError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(extract)).unwrap_or_else(|payload| {
        Err(ExtractorError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    });
    let signal = match outcome {
        Ok(v) if v.is_finite() => RawSignal::score(method, v),
        Ok(_) => RawSignal::failed(method, ExtractorError::NonFinite),
        Err(reason) => RawSignal::failed(method, reason),
    };
    match &signal.outcome {
        SignalOutcome::Score { value } => {
            tracing::debug!(method, score = *value, "extractor score");
        }
        SignalOutcome::Failed { reason } => {
            tracing::warn!(method, reason = %reason, "extractor failed; counted as 0");
        }
    }
    signal
}

/// Weighted sum of the named components, capped at 1.
pub(crate) fn combine_weighted(components: &[RawSignal], weights: &[(&str, f32)]) -> f32 {
    let total: f32 = weights
        .iter()
        .map(|&(method, w)| {
            components
                .iter()
                .find(|s| s.method == method)
                .map_or(0.0, |s| w * s.value())
        })
        .sum();
    total.clamp(0.0, 1.0)
}

/// Largest component value, capped at 1.
pub(crate) fn combine_max(components: &[RawSignal]) -> f32 {
    components
        .iter()
        .map(RawSignal::value)
        .fold(0.0f32, f32::max)
        .min(1.0)
}
