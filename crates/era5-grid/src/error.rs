//! Error types for gridded field handling.

use thiserror::Error;

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;

#[derive(Debug, Error)]
pub enum GridError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The NetCDF file could not be opened or read
    #[error("Unreadable NetCDF file: {0}")]
    UnreadableFile(String),

    /// A required dimension or variable is missing
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Dimensions, coordinates, or payload sizes disagree
    #[error("Inconsistent grid: {0}")]
    InconsistentGrid(String),

    /// A requested pressure level is not present in the file
    #[error("Pressure level {0} hPa not found in file (available: {1})")]
    LevelNotFound(f32, String),

    /// A bounding box selects no grid points
    #[error("Bounding box selects no grid points: {0}")]
    EmptySelection(String),
}
