//! Error types shared across the turbwx pipeline.

use thiserror::Error;

/// Result type alias using TurbError.
pub type TurbResult<T> = Result<T, TurbError>;

/// Pipeline-level error taxonomy.
///
/// Library crates carry their own error enums; the orchestrator converts
/// them into these categories at its boundary so every failure maps to
/// exactly one user-facing message.
#[derive(Debug, Error)]
pub enum TurbError {
    // === Request errors (no work performed) ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    // === Data acquisition errors ===
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Data retrieval timed out")]
    DataTimeout,

    #[error("Downloaded data is unreadable: {0}")]
    DataCorrupt(String),

    // === Product errors ===
    #[error("Rendering failed: {0}")]
    RenderingFailure(String),

    // === Infrastructure errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TurbError {
    /// Human-readable message sent back over chat.
    ///
    /// Every variant renders exactly one message; request errors include
    /// enough guidance to correct the input.
    pub fn user_message(&self, known_regions: &[&str]) -> String {
        match self {
            TurbError::InvalidRequest(msg) => {
                format!(
                    "I couldn't process that request: {}.\n\
                     Expected format: <YYYY-MM-DD> <HH:MM> <region>, \
                     with a whole hour (for example 10:00).",
                    msg
                )
            }
            TurbError::UnknownRegion(name) => {
                format!(
                    "I don't know the region \"{}\". Available regions: {}.",
                    name,
                    known_regions.join(", ")
                )
            }
            TurbError::DataUnavailable(msg) => {
                format!(
                    "The archive has no data for that request: {}. \
                     Reanalysis data trails real time by about five days.",
                    msg
                )
            }
            TurbError::DataTimeout => "The data archive is taking too long to respond. \
                 Please try again in a few minutes."
                .to_string(),
            TurbError::DataCorrupt(_) => "The downloaded data could not be read. \
                 Please try again; if the problem persists the archive may be \
                 serving a bad file."
                .to_string(),
            TurbError::RenderingFailure(_) | TurbError::Internal(_) => {
                "Something went wrong on my side while preparing the map. \
                 Please try again."
                    .to_string()
            }
        }
    }

    /// Whether the pipeline may retry the failed stage.
    ///
    /// Only archive timeouts are retried; every other failure is either
    /// permanent for the given input or needs operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TurbError::DataTimeout)
    }

    /// Stable label for metrics and status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            TurbError::InvalidRequest(_) => "invalid_request",
            TurbError::UnknownRegion(_) => "unknown_region",
            TurbError::DataUnavailable(_) => "data_unavailable",
            TurbError::DataTimeout => "data_timeout",
            TurbError::DataCorrupt(_) => "data_corrupt",
            TurbError::RenderingFailure(_) => "rendering_failure",
            TurbError::Internal(_) => "internal",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for TurbError {
    fn from(err: std::io::Error) -> Self {
        TurbError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TurbError {
    fn from(err: serde_json::Error) -> Self {
        TurbError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_retryable() {
        assert!(TurbError::DataTimeout.is_retryable());
        assert!(!TurbError::InvalidRequest("x".into()).is_retryable());
        assert!(!TurbError::UnknownRegion("x".into()).is_retryable());
        assert!(!TurbError::DataUnavailable("x".into()).is_retryable());
        assert!(!TurbError::DataCorrupt("x".into()).is_retryable());
        assert!(!TurbError::RenderingFailure("x".into()).is_retryable());
        assert!(!TurbError::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_unknown_region_message_lists_regions() {
        let msg = TurbError::UnknownRegion("Atlantis".into()).user_message(&["Asia", "Europe"]);
        assert!(msg.contains("Atlantis"));
        assert!(msg.contains("Asia, Europe"));
    }
}
