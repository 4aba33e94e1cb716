//! Error types for Playbook

use thiserror::Error;

/// Main error type for Playbook operations
#[derive(Error, Debug)]
pub enum PlaybookError {
    /// Persistence errors (temp file, atomic replace, directory creation)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extraction collaborator errors
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Hook protocol errors
    #[error("Hook error: {0}")]
    Hook(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PlaybookError {
    fn from(e: serde_json::Error) -> Self {
        PlaybookError::Serialization(e.to_string())
    }
}

/// Result type alias for Playbook operations
pub type Result<T> = std::result::Result<T, PlaybookError>;
