/// Errors from keyed blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing database for a persistence key could not be opened.
    #[error("store {key} unavailable: {reason}")]
    Unavailable { key: String, reason: String },

    /// The key cannot be represented by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
