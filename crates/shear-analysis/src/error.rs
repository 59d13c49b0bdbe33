//! Error types for shear analysis.

use thiserror::Error;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Inputs disagree in shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An operation needs more grid points than the input has
    #[error("Grid too small: {0}")]
    GridTooSmall(String),

    /// A required pressure level is absent
    #[error("Missing level: {0} hPa")]
    MissingLevel(f32),

    /// Threshold table is not strictly ascending and positive
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),
}
