//! Request-level error taxonomy.
//!
//! Every analysis request resolves to a single symbol tree or a single typed
//! failure. Malformed *content* never raises while error recovery is enabled;
//! only structural failures (missing grammar, unreadable file, broken worker)
//! surface through this enum.

use thiserror::Error;

/// Errors surfaced to callers of the outline API.
#[derive(Error, Debug)]
pub enum OutlineError {
    /// No grammar resource exists for the requested language version.
    #[error("version {version} is currently not supported")]
    UnsupportedVersion { version: String },

    /// The parser could not continue and error recovery was disabled.
    ///
    /// `line` is 1-based, `col` is 0-based, both pointing at the first
    /// offending token.
    #[error("{message} (line {line}, column {col})")]
    Syntax { line: u32, col: u32, message: String },

    /// The isolation worker failed, produced no usable artifact, or produced
    /// a malformed one. Never retried automatically.
    #[error("{0}")]
    Analysis(String),

    /// The backend-selection string from the preference store is unknown.
    #[error("unknown analysis backend: {0:?}")]
    UnsupportedBackend(String),

    /// The input file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OutlineError {
    pub(crate) fn analysis(message: impl Into<String>) -> Self {
        OutlineError::Analysis(message.into())
    }
}
