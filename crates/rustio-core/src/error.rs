//! Error type for configuration loading and persistence.

use std::path::PathBuf;

/// Errors produced while loading or saving the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem access to the configuration directory or file failed.
    #[error("config I/O failed for {path}: {source}")]
    Io {
        /// The path the operation was working on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file contents could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
