//! Error handling for survey file imports.
//!
//! Per-record decode problems (`MalformedLine`, `UnsupportedUnit`) are
//! recoverable: the record is skipped and reading continues. Everything else
//! aborts the import.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Could not acquire shared lock on {path}: {source}")]
    LockUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line: {reason}")]
    MalformedLine { reason: String },

    #[error("Unsupported unit code '{code}'")]
    UnsupportedUnit { code: String },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    #[error("Unknown source format for file: {path}")]
    UnknownFormat { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl ImportError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            reason: reason.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// True for errors that only invalidate the current record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ImportError::MalformedLine { .. } | ImportError::UnsupportedUnit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
