//! Error taxonomy for loaders and artifact readers.
//!
//! Scoring, selection and gating never return these: their failure modes are
//! structured results. Only setup-time I/O (datasets, rollouts, run dirs)
//! fails fast through [`HarnessError`].

use std::path::PathBuf;

/// Harness errors.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid JSON on line {line} of {path:?}: {message}")]
    InvalidJsonLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("expected a JSON object on line {line} of {path:?}, got {found}")]
    NotAnObject {
        path: PathBuf,
        line: usize,
        found: String,
    },

    #[error("record missing required field(s) {fields:?}: {record}")]
    MissingField { fields: Vec<String>, record: String },

    #[error("invalid example: {0}")]
    InvalidExample(String),

    #[error("invalid record in {path:?}: {message}")]
    InvalidRecord { path: PathBuf, message: String },

    #[error("duplicate id {id:?} in {path:?}")]
    DuplicateId { path: PathBuf, id: String },

    #[error("run artifact not found: {0:?}")]
    MissingArtifact(PathBuf),

    #[error("git error: {0}")]
    GitError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness loaders.
pub type Result<T> = std::result::Result<T, HarnessError>;
