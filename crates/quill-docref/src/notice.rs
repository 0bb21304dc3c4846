//! User-visible, non-blocking notices for absorbed resolution failures.

use std::fmt;
use std::sync::Mutex;

use quill_types::AnchorId;

use crate::error::DocRefError;

/// Something the user should be told about without interrupting them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    AnchorMissing { anchor: String },
    MissingLink { anchor: String },
    LinkUnresolved { anchor: String, link: String },
    MetadataUnavailable { path: String },
    ReadFailed { anchor: String, reason: String },
}

impl Notice {
    /// The notice for a failed resolution of `anchor`.
    pub fn from_error(anchor: &AnchorId, err: &DocRefError) -> Self {
        match err {
            DocRefError::ReferenceNotFound { anchor } => Self::AnchorMissing {
                anchor: anchor.clone(),
            },
            DocRefError::MissingLink { anchor } => Self::MissingLink {
                anchor: anchor.clone(),
            },
            DocRefError::LinkUnresolved { anchor, link } => Self::LinkUnresolved {
                anchor: anchor.clone(),
                link: link.clone(),
            },
            DocRefError::MetadataUnavailable { path } => Self::MetadataUnavailable {
                path: path.clone(),
            },
            other => Self::ReadFailed {
                anchor: anchor.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorMissing { anchor } => write!(f, "Asset block not found: {anchor}"),
            Self::MissingLink { anchor } => {
                write!(f, "Asset block does not reference a link: {anchor}")
            }
            Self::LinkUnresolved { anchor, link } => write!(
                f,
                "Asset block link did not reference a known file: {anchor} ({link})"
            ),
            Self::MetadataUnavailable { path } => {
                write!(f, "Document metadata is unavailable for {path}")
            }
            Self::ReadFailed { anchor, reason } => {
                write!(f, "Could not read asset {anchor}: {reason}")
            }
        }
    }
}

/// Sink for notices. Hosts route these to toasts, status bars, logs.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as `tracing` warnings.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!("{notice}");
    }
}

/// Collects notices in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock poisoned").clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().expect("lock poisoned"))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("lock poisoned").push(notice);
    }
}
