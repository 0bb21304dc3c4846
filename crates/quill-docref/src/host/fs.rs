use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::{candidate_name, embed_link};
use crate::error::DocRefResult;
use crate::markdown::parse_metadata;
use crate::traits::{AttachmentVault, DocumentEdit, HostDocument};
use crate::types::{AttachmentFile, DocumentMetadata};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Gives up on finding a free attachment name after this many candidates.
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// A markdown file on disk, with attachments placed in a folder beside it.
///
/// Edits made through [`process`](HostDocument::process) are serialized and
/// land through write-then-rename. Edits made by other programs do not fire
/// the change signal until [`notify_changed`](Self::notify_changed) is
/// called. Links are confined to the document's directory tree.
pub struct FsDocument {
    path: PathBuf,
    attachment_dir: PathBuf,
    edit_lock: Mutex<()>,
    changes: watch::Sender<u64>,
}

impl FsDocument {
    /// Attachments go in the document's own directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let attachment_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let (changes, _) = watch::channel(0);
        Self {
            path,
            attachment_dir,
            edit_lock: Mutex::new(()),
            changes,
        }
    }

    /// Place attachments in `folder`. A relative folder is taken relative to
    /// the document's directory.
    pub fn with_attachment_folder(mut self, folder: impl AsRef<Path>) -> Self {
        self.attachment_dir = self.directory().join(folder);
        self
    }

    pub fn attachment_dir(&self) -> &Path {
        &self.attachment_dir
    }

    fn directory(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Signal that the file changed outside this process.
    pub fn notify_changed(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    async fn write_atomic(&self, text: &str) -> DocRefResult<()> {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.directory().join(format!(".{name}.{n}.tmp"));
        fs::write(&tmp, text).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// True when `link` is relative and never climbs above the folder it is
/// joined to.
fn stays_inside(link: &Path) -> bool {
    let mut depth = 0usize;
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

#[async_trait]
impl HostDocument for FsDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn read_text(&self) -> DocRefResult<String> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    async fn metadata(&self) -> DocRefResult<Option<DocumentMetadata>> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(parse_metadata(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn process(&self, edit: DocumentEdit) -> DocRefResult<String> {
        let _guard = self.edit_lock.lock().await;
        let current = fs::read_to_string(&self.path).await?;
        let next = edit(current.as_str());
        self.write_atomic(&next).await?;
        self.notify_changed();
        debug!(path = %self.path.display(), bytes = next.len(), "document rewritten");
        Ok(next)
    }

    async fn resolve_link(&self, link: &str) -> DocRefResult<Option<AttachmentFile>> {
        if !stays_inside(Path::new(link)) {
            warn!(path = %self.path.display(), link, "refusing link outside the document folder");
            return Ok(None);
        }
        for dir in [self.directory(), self.attachment_dir.clone()] {
            let candidate = dir.join(link);
            if is_file(&candidate).await {
                return Ok(Some(AttachmentFile::new(candidate)));
            }
        }
        Ok(None)
    }

    fn link_to(&self, file: &AttachmentFile) -> String {
        embed_link(&file.file_name())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl AttachmentVault for FsDocument {
    async fn place(&self, filename: &str, bytes: Bytes) -> DocRefResult<AttachmentFile> {
        fs::create_dir_all(&self.attachment_dir).await?;
        for n in 0..MAX_NAME_ATTEMPTS {
            let path = self.attachment_dir.join(candidate_name(filename, n));
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&bytes).await?;
            file.flush().await?;
            debug!(path = %path.display(), bytes = bytes.len(), "attachment placed");
            return Ok(AttachmentFile::new(path));
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free name for {filename} in {}", self.attachment_dir.display()),
        )
        .into())
    }

    async fn read(&self, file: &AttachmentFile) -> DocRefResult<Bytes> {
        Ok(Bytes::from(fs::read(&file.path).await?))
    }
}

impl std::fmt::Debug for FsDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsDocument")
            .field("path", &self.path)
            .field("attachment_dir", &self.attachment_dir)
            .finish()
    }
}
