//! Error types for document reference operations.

use thiserror::Error;

/// Errors that can occur while storing or resolving document references.
#[derive(Debug, Error)]
pub enum DocRefError {
    /// The anchor is not (or no longer) present in the document.
    #[error("asset block not found: {anchor}")]
    ReferenceNotFound { anchor: String },

    /// The block exists but its text carries no link.
    #[error("asset block does not reference a link: {anchor}")]
    MissingLink { anchor: String },

    /// The block's link does not point at a known file.
    #[error("asset block link did not reference a known file: {anchor} ({link})")]
    LinkUnresolved { anchor: String, link: String },

    /// A write was attempted through a read-only proxy.
    #[error("storing assets is prohibited in read-only mode: {path}")]
    PermissionDenied { path: String },

    /// The host has no parsed metadata for the document.
    #[error("document metadata is unavailable for {path}")]
    MetadataUnavailable { path: String },

    /// An anchor id failed validation.
    #[error(transparent)]
    InvalidAnchor(#[from] quill_types::TypeError),

    /// I/O error from a document or attachment collaborator.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for document reference operations.
pub type DocRefResult<T> = std::result::Result<T, DocRefError>;
