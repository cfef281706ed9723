use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or following a log file.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Log file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading configuration or building an extractor.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("No log path configured")]
    MissingLogPath,
}

/// Errors raised when creating a dispatcher.
///
/// Per-line problems never surface here; they are absorbed by the
/// consumption loop.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Log file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SourceError> for DispatchError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(path) => DispatchError::NotFound(path),
            SourceError::Io { path, source } => DispatchError::Io { path, source },
        }
    }
}
