//! Error types for the seqsel crate

use thiserror::Error;

/// Result type alias for seqsel operations
pub type Result<T> = std::result::Result<T, SeqselError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum SeqselError {
    /// A candidate model could not be trained (parameter count exceeds sample
    /// support, EM divergence, degenerate statistics). Recovered inside the
    /// candidate loops; never reaches selection callers.
    #[error("Fit error: {0}")]
    FitError(String),

    /// A trained model could not produce a likelihood for given data.
    #[error("Score error: {0}")]
    ScoreError(String),

    /// Too few sequences for the requested fold count.
    #[error("Insufficient data: {needed} sequences needed, {available} available")]
    InsufficientData { needed: usize, available: usize },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid shape: {0}")]
    ShapeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ndarray::ShapeError> for SeqselError {
    fn from(err: ndarray::ShapeError) -> Self {
        SeqselError::ShapeError(err.to_string())
    }
}

impl From<serde_json::Error> for SeqselError {
    fn from(err: serde_json::Error) -> Self {
        SeqselError::SerializationError(err.to_string())
    }
}
