//! Error handling for the detection and alert pipeline
//!
//! Startup and frame-loop failures are `ProxError`s. Alert playback has its
//! own [`crate::audio::AlertError`] because those failures never leave the
//! alert path.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the detection pipeline
#[derive(Error, Debug)]
pub enum ProxError {
    // Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Class list missing, unreadable or empty: {0}")]
    ClassListError(PathBuf),

    #[error("Model loading failed: {0}")]
    ModelLoadError(PathBuf),

    #[error(
        "Detector output shape mismatch: expected {rows} x {dimensions} = {expected} values, got {actual}"
    )]
    OutputShapeMismatch {
        rows: usize,
        dimensions: usize,
        expected: usize,
        actual: usize,
    },

    // Inference errors
    #[error("Inference execution failed: {0}")]
    Inference(String),

    // Capture and display errors
    #[error("Capture exhausted: frame source returned an empty frame")]
    CaptureExhausted,

    #[error("Frame capture failed: {0}")]
    CaptureError(String),

    #[error("Display failed: {0}")]
    DisplayError(String),

    #[error("Feature not enabled in this build: {0}")]
    FeatureDisabled(&'static str),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ProxError {
    /// Errors that mean the model/class pairing or runtime shape is
    /// inconsistent and the process must not continue
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProxError::Configuration(_)
                | ProxError::ClassListError(_)
                | ProxError::ModelLoadError(_)
                | ProxError::OutputShapeMismatch { .. }
        )
    }
}

/// Result type alias for convenience
pub type ProxResult<T> = std::result::Result<T, ProxError>;

impl From<crate::inference::InferenceError> for ProxError {
    fn from(err: crate::inference::InferenceError) -> Self {
        use crate::inference::InferenceError;

        match err {
            InferenceError::ModelLoadError(path) => ProxError::ModelLoadError(path),
            InferenceError::OutputShapeMismatch {
                rows,
                dimensions,
                actual,
            } => ProxError::OutputShapeMismatch {
                rows,
                dimensions,
                expected: rows * dimensions,
                actual,
            },
            InferenceError::InvalidLayout(msg) => ProxError::Configuration(msg),
            other => ProxError::Inference(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for ProxError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProxError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for ProxError {
    fn from(err: std::io::Error) -> Self {
        ProxError::Unexpected(format!("I/O error: {}", err))
    }
}
