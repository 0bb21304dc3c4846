//! Collaborator interfaces the proxy consumes.
//!
//! A host (an editor's vault, a directory of markdown files, an in-memory
//! test double) implements these traits; the proxy never touches host state
//! any other way.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::error::DocRefResult;
use crate::types::{AttachmentFile, DocumentMetadata};

/// A pure edit applied inside an atomic read-modify-write.
///
/// Receives the current text and returns the replacement text.
pub type DocumentEdit = Box<dyn FnOnce(&str) -> String + Send>;

/// The host text document that owns a drawing.
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Path of the document, as the host names it.
    fn path(&self) -> &Path;

    /// Read the full text.
    async fn read_text(&self) -> DocRefResult<String>;

    /// Parsed addressing metadata, or `None` when the host has none yet.
    async fn metadata(&self) -> DocRefResult<Option<DocumentMetadata>>;

    /// Atomically read the current text, apply `edit`, and write the result.
    ///
    /// No other update of the same document may interleave between the read
    /// and the write. Returns the text that was written.
    async fn process(&self, edit: DocumentEdit) -> DocRefResult<String>;

    /// Resolve a link string, relative to this document, to a file.
    async fn resolve_link(&self, link: &str) -> DocRefResult<Option<AttachmentFile>>;

    /// Produce the link text that points at `file` from this document.
    fn link_to(&self, file: &AttachmentFile) -> String;

    /// Change signal: the value is a revision counter bumped on every change
    /// to the document's content or metadata.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Places and reads the binary files that documents link to.
#[async_trait]
pub trait AttachmentVault: Send + Sync {
    /// Write `bytes` beside the document under an available name derived
    /// from `filename`.
    async fn place(&self, filename: &str, bytes: Bytes) -> DocRefResult<AttachmentFile>;

    /// Read an attachment's bytes.
    async fn read(&self, file: &AttachmentFile) -> DocRefResult<Bytes>;
}
