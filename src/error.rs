use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid reference entry {key:?}: {reason}")]
    Validation { key: String, reason: String },

    #[error("missing input: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),

    #[error("invalid intensity grid: {0}")]
    InvalidGrid(String),

    #[error("malformed report {}: {reason}", path.display())]
    MalformedReport { path: PathBuf, reason: String },

    #[error("plot failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Fewer than two strips produced a full two-peak result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not enough peak data to calculate statistics ({complete_strips} strip(s) with two peaks)")]
pub struct InsufficientData {
    pub complete_strips: usize,
}

impl PipelineError {
    pub fn validation(key: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }
}
