//! Error types for the athena core library.

/// Top-level error enum for the athena core library.
#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    #[error("Entity file not found: {0}")]
    NotFound(String),

    #[error("Entity not found in file: {name} ({path})")]
    EntityNotFound { path: String, name: String },

    #[error("Cannot inspect excluded path: {0}")]
    Excluded(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Malformed entity path: {0}")]
    Malformed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AthenaError {
    /// Whether a bulk traversal may record this failure against a single
    /// member and keep going.
    pub fn is_member_recoverable(&self) -> bool {
        matches!(
            self,
            AthenaError::NotFound(_) | AthenaError::EntityNotFound { .. } | AthenaError::Parse(_)
        )
    }
}

pub type AthenaResult<T> = Result<T, AthenaError>;
