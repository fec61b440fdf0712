//! Errors from loading scene data, configuration and conversations.

use std::path::PathBuf;

/// Result type for loading operations.
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse KDL: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("font error: {0}")]
    Font(#[from] freetype::Error),

    /// Parsed, but the content breaks an invariant (missing field, bad value).
    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The background worker went away before answering.
    #[error("conversation worker disconnected")]
    Disconnected,
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        LoadError::Malformed(msg.into())
    }
}

/// Read a whole file, tagging failures with the path.
pub(crate) fn read_to_string(path: impl AsRef<std::path::Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))
}
