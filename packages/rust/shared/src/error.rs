//! Error types for answerflow.
//!
//! Library crates use [`AnswerFlowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The streaming pipeline itself never returns these: malformed input is
//! recovered where it is detected. Errors only come from configuration
//! loading and session bookkeeping.

use std::path::PathBuf;

/// Top-level error type for all answerflow operations.
#[derive(Debug, thiserror::Error)]
pub enum AnswerFlowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input that could not be parsed at all (e.g. a replay file).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (out-of-range setting, invalid argument, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A chat turn id that the session does not (or no longer) hold.
    #[error("unknown turn: {0}")]
    UnknownTurn(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AnswerFlowError>;

impl AnswerFlowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
}
