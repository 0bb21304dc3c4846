//! # quill-docref
//!
//! Uses a host text document as an asset directory. Each stored asset is a
//! file placed beside the document plus a reference block inserted after
//! the document's front matter:
//!
//! ```text
//! ---
//! tldraw-file: true
//! ---
//! ![[5f0c...-pic.png]]
//! ^5f0c2b9e-...
//! ```
//!
//! The block's anchor id is the asset's address
//! (`asset:obsidian.blockref.<id>`). Resolving an address locates the block
//! through the document's metadata, follows its link and mints a handle
//! for the bytes. Failures while resolving are reported as [`Notice`]s and
//! never surface to the caller as errors.

pub mod error;
pub mod host;
pub mod links;
pub mod markdown;
pub mod names;
pub mod notice;
pub mod proxy;
pub mod traits;
pub mod types;

pub use error::{DocRefError, DocRefResult};
pub use host::{FsDocument, MemoryDocument};
pub use links::extract_link;
pub use markdown::{insert_after_frontmatter, parse_metadata, reference_block};
pub use names::{attachment_filename, object_name};
pub use notice::{Notice, Notifier, RecordingNotifier, TracingNotifier};
pub use proxy::{AccessMode, ContentsListener, DocumentReferenceProxy};
pub use traits::{AttachmentVault, DocumentEdit, HostDocument};
pub use types::{AttachmentFile, BlockAnchor, DocumentMetadata, DocumentReference, Span};
