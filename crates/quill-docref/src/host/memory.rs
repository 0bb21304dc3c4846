use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use super::{available_name, embed_link};
use crate::error::DocRefResult;
use crate::markdown::parse_metadata;
use crate::traits::{AttachmentVault, DocumentEdit, HostDocument};
use crate::types::{AttachmentFile, DocumentMetadata};

/// An in-memory document with its attachments kept beside it.
///
/// Suitable for tests and for hosts that stage documents before saving.
/// Links are wiki embeds resolved by path relative to the document's
/// directory, falling back to a unique file-name match.
pub struct MemoryDocument {
    path: PathBuf,
    text: Mutex<String>,
    attachments: RwLock<BTreeMap<PathBuf, Bytes>>,
    changes: watch::Sender<u64>,
    metadata_available: AtomicBool,
}

impl MemoryDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            path: path.into(),
            text: Mutex::new(text.into()),
            attachments: RwLock::new(BTreeMap::new()),
            changes,
            metadata_available: AtomicBool::new(true),
        }
    }

    fn directory(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    fn bump(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    /// Replace the text, as an external edit would.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().expect("lock poisoned") = text.into();
        self.bump();
    }

    pub fn text(&self) -> String {
        self.text.lock().expect("lock poisoned").clone()
    }

    /// Simulate the host not having indexed the document yet.
    pub fn set_metadata_available(&self, available: bool) {
        self.metadata_available.store(available, Ordering::SeqCst);
        self.bump();
    }

    /// Delete the attachment `link` points at. Returns whether one existed.
    pub fn remove_attachment(&self, link: &str) -> bool {
        let Some(path) = self.find(link) else {
            return false;
        };
        self.attachments
            .write()
            .expect("lock poisoned")
            .remove(&path)
            .is_some()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.read().expect("lock poisoned").len()
    }

    fn find(&self, link: &str) -> Option<PathBuf> {
        let attachments = self.attachments.read().expect("lock poisoned");
        let relative = self.directory().join(link);
        if attachments.contains_key(&relative) {
            return Some(relative);
        }
        let mut by_name = attachments
            .keys()
            .filter(|p| p.file_name().is_some_and(|n| n == link));
        match (by_name.next(), by_name.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl HostDocument for MemoryDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn read_text(&self) -> DocRefResult<String> {
        Ok(self.text())
    }

    async fn metadata(&self) -> DocRefResult<Option<DocumentMetadata>> {
        if !self.metadata_available.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(parse_metadata(&self.text())))
    }

    async fn process(&self, edit: DocumentEdit) -> DocRefResult<String> {
        let written = {
            let mut text = self.text.lock().expect("lock poisoned");
            let next = edit(text.as_str());
            *text = next.clone();
            next
        };
        self.bump();
        Ok(written)
    }

    async fn resolve_link(&self, link: &str) -> DocRefResult<Option<AttachmentFile>> {
        Ok(self.find(link).map(AttachmentFile::new))
    }

    fn link_to(&self, file: &AttachmentFile) -> String {
        embed_link(&file.file_name())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl AttachmentVault for MemoryDocument {
    async fn place(&self, filename: &str, bytes: Bytes) -> DocRefResult<AttachmentFile> {
        let dir = self.directory();
        let mut attachments = self.attachments.write().expect("lock poisoned");
        let name = available_name(filename, |n| attachments.contains_key(&dir.join(n)));
        let path = dir.join(name);
        attachments.insert(path.clone(), bytes);
        Ok(AttachmentFile::new(path))
    }

    async fn read(&self, file: &AttachmentFile) -> DocRefResult<Bytes> {
        self.attachments
            .read()
            .expect("lock poisoned")
            .get(&file.path)
            .cloned()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no attachment at {}", file.path.display()),
                )
                .into()
            })
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("path", &self.path)
            .field("attachments", &self.attachment_count())
            .finish()
    }
}
