//! Error types for local session storage.

use std::path::Path;

/// Error type for session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a storage file failed.
    #[error("{action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: String,
        source: std::io::Error,
    },

    /// A storage file holds invalid JSON.
    #[error("corrupt file '{path}': {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    /// Serializing data for storage failed.
    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for session storage operations.
pub type Result<T> = std::result::Result<T, Error>;
