//! Storage error types.

/// Errors produced by chunk and persistent stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("injected failure for {0}")]
    Injected(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Maps an I/O error on `key`, turning `NotFound` into [`StoreError::NotFound`].
    pub(crate) fn from_io(key: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io(err)
        }
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
