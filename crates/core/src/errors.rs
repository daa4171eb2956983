//! Error taxonomy for the ingestion engine.
//!
//! Mirrors the error categories a caller actually needs to branch on: configuration
//! failures are fatal-at-init, transport failures are retryable-or-not, and the rest are
//! per-item failures that get collected into a sync summary rather than aborting it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transient transport error: {0}")]
    Transient(String),

    #[error("permanent transport error (status {status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("processor error in '{processor}': {message}")]
    Processor { processor: String, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl IngestError {
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::Configuration(_) => "configuration",
            IngestError::Transient(_) => "transient",
            IngestError::Permanent { .. } => "permanent",
            IngestError::Parse(_) => "parse",
            IngestError::Processor { .. } => "processor",
            IngestError::Store(_) => "store",
            IngestError::Scheduler(_) => "scheduler",
        }
    }
}

/// Classifies whether an error is worth retrying. Implemented for `IngestError` so the
/// retry executor (`crate::retry`) can decide without depending on adapter-specific types,
/// and for `anyhow::Error` so adapters that bubble up raw `reqwest` failures still compose.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
    fn is_rate_limited(&self) -> bool {
        false
    }
    /// The server-advised delay before retrying, if the error carries a parsed
    /// `Retry-After` value (`crate::retry::HttpError` is the only implementor that does).
    fn retry_after(&self) -> Option<std::time::Duration> {
        None
    }
}

impl RetryableError for IngestError {
    fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Transient(_))
    }
}

impl RetryableError for anyhow::Error {
    fn is_retryable(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        [
            "timeout",
            "timed out",
            "connection reset",
            "connection refused",
            "temporarily unavailable",
            "broken pipe",
            "502",
            "503",
            "504",
        ]
        .iter()
        .any(|needle| msg.contains(needle))
    }

    fn is_rate_limited(&self) -> bool {
        self.to_string().contains("429")
    }
}
