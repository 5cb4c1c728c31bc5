//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Version not found.
    #[error("Version not found: {0}")]
    NotFound(u64),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A path could not be mapped into the project.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Version storage is inconsistent with the manifest.
    #[error("Version storage corrupted: {0}")]
    Corrupted(String),
}

impl SnapshotError {
    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a corrupted storage error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
