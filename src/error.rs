use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReconcileError {
    #[error("source {source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout { source_name: String, timeout_ms: u64 },

    #[error("source {source_name} returned {rows} rows (minimum {minimum})")]
    InsufficientData {
        source_name: String,
        rows: usize,
        minimum: usize,
    },

    #[error("source {source_name} returned a malformed response: {message}")]
    MalformedResponse {
        source_name: String,
        message: String,
    },

    #[error("no source produced usable data")]
    #[diagnostic(help(
        "previously persisted data is kept when it exists; retry later or pass --source"
    ))]
    TotalAcquisitionFailure,

    #[error("invalid season: {0}")]
    InvalidSeason(String),

    #[error("invalid team code: {0}")]
    InvalidTeamCode(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigInvalid(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP request returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },
}

impl ReconcileError {
    pub fn unavailable(source_name: &str, message: impl Into<String>) -> Self {
        ReconcileError::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(source_name: &str, message: impl Into<String>) -> Self {
        ReconcileError::MalformedResponse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}
