use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid anchor id {id:?}: {reason}")]
    InvalidAnchor { id: String, reason: String },

    #[error("not an asset address: {0}")]
    NotAnAddress(String),
}
