//! Patch error types.

use thiserror::Error;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors that can occur while patching a document.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Tag names must be plain element names before they reach a pattern.
    #[error("Invalid tag name: {0:?}")]
    InvalidTagName(String),

    /// Regex error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl PatchError {
    /// Create an invalid tag name error.
    pub fn invalid_tag(name: impl Into<String>) -> Self {
        Self::InvalidTagName(name.into())
    }
}
