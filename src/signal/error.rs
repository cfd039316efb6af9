//! Errors raised while preparing signals from files.

use std::path::PathBuf;

/// Errors that can occur while loading or preparing signals.
#[derive(Debug)]
pub enum SignalError {
    /// Underlying filesystem error
    Io { path: PathBuf, message: String },
    /// Path does not exist
    NotFound(PathBuf),
    /// Directory exists but holds no file of the requested kind
    NoFiles { path: PathBuf, kind: String },
    /// Malformed content
    Parse { path: PathBuf, message: String },
    /// Unrecognized signal source or measure name
    UnknownMeasure(String),
    /// Local time that cannot be mapped to an instant
    Timestamp(String),
}

impl SignalError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SignalError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SignalError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::Io { path, message } => write!(f, "IO error on {path:?}: {message}"),
            SignalError::NotFound(path) => write!(f, "File does not exist: {path:?}"),
            SignalError::NoFiles { path, kind } => {
                write!(f, "No {kind} files found in directory: {path:?}")
            }
            SignalError::Parse { path, message } => {
                write!(f, "Parse error in {path:?}: {message}")
            }
            SignalError::UnknownMeasure(name) => write!(f, "Unknown measure: {name}"),
            SignalError::Timestamp(e) => write!(f, "Timestamp error: {e}"),
        }
    }
}

impl std::error::Error for SignalError {}
