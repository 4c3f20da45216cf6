//! Error types for decoding, configuration and detector backends.

use std::path::PathBuf;

use crate::Category;

/// Errors surfaced by the moderation pipeline.
///
/// None of these ever escape [`crate::Moderator::moderate`]: they degrade the
/// content of the verdict instead (conservative failure or fallback).
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Malformed or unsupported image bytes.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    /// The image decoded but has no pixels.
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    /// A detector backend could not be initialized.
    #[error("{category} backend unavailable: {reason}")]
    BackendUnavailable { category: Category, reason: String },
    /// A configuration section failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A configuration or sidecar file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A configuration or sidecar file is not valid JSON for its schema.
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ModerationError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}
