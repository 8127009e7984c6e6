//! Error types for docnorm.
//!
//! Library crates use [`DocNormError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docnorm operations.
#[derive(Debug, thiserror::Error)]
pub enum DocNormError {
    /// Configuration loading or validation error (bad root path, bad TOML).
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Directory traversal error that cannot be skipped.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Failure while writing an index artifact. Fatal to the run: a run
    /// without a written index is materially worthless.
    #[error("index write error at {path:?}: {message}")]
    Index { path: PathBuf, message: String },

    /// Data validation error (schema mismatch, invalid record shape, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocNormError>;

impl DocNormError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an index-write error for the given artifact path.
    pub fn index(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Index {
            path: path.into(),
            message: msg.into(),
        }
    }
}
