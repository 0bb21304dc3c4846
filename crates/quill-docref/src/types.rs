//! Core types describing a host document's addressable structure.

use std::collections::BTreeMap;
use std::path::PathBuf;

use quill_types::AnchorId;
use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)` into a document's text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slice of `text` covered by this span, if it lies on char boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// A named block inside the document (`... ^id`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAnchor {
    pub id: String,
    /// The whole block, anchor line included.
    pub span: Span,
}

/// Parsed addressing metadata of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Leading front-matter block, delimiters included.
    pub frontmatter: Option<Span>,
    /// Block anchors keyed by id.
    pub blocks: BTreeMap<String, BlockAnchor>,
}

impl DocumentMetadata {
    pub fn block(&self, id: &str) -> Option<&BlockAnchor> {
        self.blocks.get(id)
    }
}

/// A file placed beside a document, as known to the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentFile {
    pub path: PathBuf,
}

impl AttachmentFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name component, used as the link target.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A reference block recorded in a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub anchor_id: AnchorId,
    pub link: String,
    pub document_path: PathBuf,
}
