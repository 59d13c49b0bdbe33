//! Error types for CDS retrieval.

use thiserror::Error;

pub type CdsResult<T> = Result<T, CdsError>;

#[derive(Debug, Error)]
pub enum CdsError {
    /// Missing or malformed credentials / endpoint configuration.
    #[error("CDS configuration error: {0}")]
    Config(String),

    /// The archive has no data for the requested selection. The message is
    /// the archive's own text, which names the latest available date.
    #[error("no data available: {0}")]
    NoData(String),

    /// The archive rejected the request for any other reason.
    #[error("CDS request rejected: {0}")]
    Rejected(String),

    /// The job was accepted but reported `failed`.
    #[error("CDS job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    /// The job did not finish within the configured total wait.
    #[error("timed out after {waited_secs}s waiting for CDS job {job_id}")]
    Timeout { job_id: String, waited_secs: u64 },

    /// Transport-level HTTP failure.
    #[error("CDS transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A reply that does not fit the job protocol.
    #[error("unexpected CDS reply: {0}")]
    Protocol(String),
}
