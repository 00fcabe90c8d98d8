use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormCheckError {
    #[error("Capture device unavailable: {reason}")]
    Device { reason: String },

    #[error("Video is not ready for capture")]
    NotReady,

    #[error("Analysis request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Analysis service error: {message}")]
    Service { message: String },

    #[error("Malformed analysis result: {reason}")]
    MalformedResult { reason: String },

    #[error("Frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl FormCheckError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResult {
            reason: reason.into(),
        }
    }

    /// Failures the scheduler logs and retries on its next submission.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Service { .. } | Self::JsonError(_) | Self::NotReady
        )
    }
}

pub type Result<T> = std::result::Result<T, FormCheckError>;
