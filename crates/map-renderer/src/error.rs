//! Error types for map rendering.

use thiserror::Error;

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Raster, extent, or scale inputs are unusable
    #[error("Invalid render input: {0}")]
    InvalidInput(String),

    /// PNG encoding failed
    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}
