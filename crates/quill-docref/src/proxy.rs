//! The document reference proxy: one host document used as an asset
//! directory.
//!
//! Storing an asset places its bytes beside the document and inserts a
//! human-visible reference block (`<link>\n^<anchor>`) right after the
//! front matter. Resolving an anchor finds that block again through the
//! document's metadata, follows its link and mints a handle for the bytes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use quill_handle::{Handle, HandleCache, HandleMinter};
use quill_types::{sniff_mime, Address, AnchorId, AssetBlob};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{DocRefError, DocRefResult};
use crate::links::extract_link;
use crate::markdown::{insert_after_frontmatter, reference_block, trailing_anchor};
use crate::names::attachment_filename;
use crate::notice::{Notice, Notifier, TracingNotifier};
use crate::traits::{AttachmentVault, HostDocument};
use crate::types::{AttachmentFile, DocumentMetadata, DocumentReference};

/// Called after each successful insert with the new document text, the
/// minted address and the placed attachment.
pub type ContentsListener = Arc<dyn Fn(&str, &Address, &AttachmentFile) + Send + Sync>;

/// Whether the proxy may write to its document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Editable,
    /// The document is open in a non-editable view; stores are refused.
    ReadOnly,
}

/// Cached metadata plus the change signal that invalidates it.
struct MetadataSnapshot {
    current: Option<Arc<DocumentMetadata>>,
    changes: watch::Receiver<u64>,
}

impl MetadataSnapshot {
    /// Drop the snapshot if the document changed since it was taken.
    fn invalidate_if_changed(&mut self) {
        if self.changes.has_changed().unwrap_or(false) {
            self.changes.borrow_and_update();
            self.current = None;
        }
    }
}

/// Makes a single host document behave as an asset directory.
pub struct DocumentReferenceProxy {
    document: Arc<dyn HostDocument>,
    vault: Arc<dyn AttachmentVault>,
    notifier: Arc<dyn Notifier>,
    cache: HandleCache,
    mode: AccessMode,
    snapshot: Mutex<MetadataSnapshot>,
    /// Serializes document mutation across concurrent `store_asset` calls.
    write_lock: tokio::sync::Mutex<()>,
    on_contents_changed: Option<ContentsListener>,
}

impl DocumentReferenceProxy {
    /// An editable proxy over `document`.
    pub fn new(
        document: Arc<dyn HostDocument>,
        vault: Arc<dyn AttachmentVault>,
        minter: Arc<dyn HandleMinter>,
    ) -> Self {
        Self::with_mode(document, vault, minter, AccessMode::Editable)
    }

    /// A proxy that refuses every `store_asset` with
    /// [`DocRefError::PermissionDenied`]. Resolution is unaffected.
    pub fn read_only(
        document: Arc<dyn HostDocument>,
        vault: Arc<dyn AttachmentVault>,
        minter: Arc<dyn HandleMinter>,
    ) -> Self {
        Self::with_mode(document, vault, minter, AccessMode::ReadOnly)
    }

    pub fn with_mode(
        document: Arc<dyn HostDocument>,
        vault: Arc<dyn AttachmentVault>,
        minter: Arc<dyn HandleMinter>,
        mode: AccessMode,
    ) -> Self {
        let changes = document.subscribe();
        Self {
            document,
            vault,
            notifier: Arc::new(TracingNotifier),
            cache: HandleCache::new(minter),
            mode,
            snapshot: Mutex::new(MetadataSnapshot {
                current: None,
                changes,
            }),
            write_lock: tokio::sync::Mutex::new(()),
            on_contents_changed: None,
        }
    }

    /// Route notices to `notifier` instead of the log.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_contents_listener(mut self, listener: ContentsListener) -> Self {
        self.on_contents_changed = Some(listener);
        self
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn document_path(&self) -> &Path {
        self.document.path()
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    /// Tell the user about something that could not be resolved.
    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    // ---- Writes ----

    /// Store `blob` beside the document and embed a reference block to it.
    ///
    /// Mutates the document exactly once, by insertion. A handle for the
    /// uploaded bytes is cached immediately, so resolving the returned
    /// address needs no document read.
    pub async fn store_asset(&self, blob: &AssetBlob) -> DocRefResult<Address> {
        if self.mode == AccessMode::ReadOnly {
            return Err(DocRefError::PermissionDenied {
                path: self.document.path().display().to_string(),
            });
        }

        let anchor = AnchorId::generate();
        let filename = attachment_filename(&anchor, &blob.name, blob.mime_type.as_deref());
        let file = self.vault.place(&filename, blob.bytes.clone()).await?;
        let link = self.document.link_to(&file);
        let block = reference_block(&link, &anchor);

        let written = {
            let _guard = self.write_lock.lock().await;
            self.document
                .process(Box::new(move |text: &str| insert_after_frontmatter(text, &block)))
                .await?
        };

        let address = Address::BlockRef(anchor);
        if let Some(listener) = &self.on_contents_changed {
            listener(&written, &address, &file);
        }

        let mime = blob
            .mime_type
            .as_deref()
            .or_else(|| sniff_mime(&blob.bytes));
        self.cache.mint(address.clone(), blob.bytes.clone(), mime);
        info!(
            document = %self.document.path().display(),
            attachment = %file.path.display(),
            %address,
            "asset stored as document reference"
        );
        Ok(address)
    }

    // ---- Reads ----

    /// Resolve an anchor to a handle, from cache or by reading the document.
    ///
    /// Every failure is absorbed: the user gets a notice and the caller gets
    /// `None`.
    pub async fn resolve(&self, anchor: &AnchorId) -> Option<Handle> {
        let address = Address::BlockRef(anchor.clone());
        if let Some(handle) = self.cache.get(&address) {
            debug!(%address, "handle cache hit");
            return Some(handle);
        }
        match self.read_asset(anchor).await {
            Ok(bytes) => {
                let mime = sniff_mime(&bytes);
                Some(self.cache.mint(address, bytes, mime))
            }
            Err(e) => {
                self.notifier.notify(Notice::from_error(anchor, &e));
                None
            }
        }
    }

    /// Cold path: find the anchor's block, follow its link, read the bytes.
    pub async fn read_asset(&self, anchor: &AnchorId) -> DocRefResult<Bytes> {
        let reference = self.lookup(anchor).await?;
        let file = self
            .document
            .resolve_link(&reference.link)
            .await?
            .ok_or_else(|| DocRefError::LinkUnresolved {
                anchor: anchor.to_string(),
                link: reference.link.clone(),
            })?;
        self.vault.read(&file).await
    }

    /// The reference recorded in the document for `anchor`.
    pub async fn lookup(&self, anchor: &AnchorId) -> DocRefResult<DocumentReference> {
        let not_found = || DocRefError::ReferenceNotFound {
            anchor: anchor.to_string(),
        };
        let metadata = self.metadata().await?;
        let text = self.document.read_text().await?;
        let contents = match anchored_block(&metadata, anchor, &text) {
            Some(contents) => contents,
            None => {
                // The snapshot no longer matches the text: an edit the host
                // never signalled moved or removed the block. Re-read once.
                debug!(%anchor, "metadata snapshot stale, refreshing");
                let metadata = self.refresh_metadata().await?;
                let text = self.document.read_text().await?;
                let contents = anchored_block(&metadata, anchor, &text).ok_or_else(not_found)?;
                return self.reference_from(anchor, contents);
            }
        };
        self.reference_from(anchor, contents)
    }

    fn reference_from(&self, anchor: &AnchorId, contents: &str) -> DocRefResult<DocumentReference> {
        let link = extract_link(contents).ok_or_else(|| DocRefError::MissingLink {
            anchor: anchor.to_string(),
        })?;
        Ok(DocumentReference {
            anchor_id: anchor.clone(),
            link,
            document_path: self.document.path().to_path_buf(),
        })
    }

    /// Every reference block in the document's current metadata.
    ///
    /// Always re-reads metadata from the host.
    pub async fn list_all(&self) -> DocRefResult<Vec<Address>> {
        let metadata = self.refresh_metadata().await?;
        let addresses = metadata
            .blocks
            .keys()
            .filter_map(|id| match AnchorId::parse(id) {
                Ok(anchor) => Some(Address::BlockRef(anchor)),
                Err(e) => {
                    debug!(id, error = %e, "skipping block with unusable anchor");
                    None
                }
            })
            .collect();
        Ok(addresses)
    }

    /// Revoke every cached handle. Idempotent.
    pub fn dispose(&self) {
        let revoked = self.cache.dispose_all();
        self.snapshot.lock().expect("lock poisoned").current = None;
        debug!(
            document = %self.document.path().display(),
            revoked,
            "document reference proxy disposed"
        );
    }

    // ---- Metadata snapshot ----

    async fn metadata(&self) -> DocRefResult<Arc<DocumentMetadata>> {
        {
            let mut snapshot = self.snapshot.lock().expect("lock poisoned");
            snapshot.invalidate_if_changed();
            if let Some(current) = &snapshot.current {
                return Ok(current.clone());
            }
        }
        self.refresh_metadata().await
    }

    async fn refresh_metadata(&self) -> DocRefResult<Arc<DocumentMetadata>> {
        {
            // Mark the current revision seen before reading, so a change
            // that lands mid-read invalidates the result on next use.
            let mut snapshot = self.snapshot.lock().expect("lock poisoned");
            snapshot.changes.borrow_and_update();
        }
        let fresh = self
            .document
            .metadata()
            .await?
            .ok_or_else(|| DocRefError::MetadataUnavailable {
                path: self.document.path().display().to_string(),
            })?;
        let fresh = Arc::new(fresh);
        self.snapshot.lock().expect("lock poisoned").current = Some(fresh.clone());
        Ok(fresh)
    }
}

/// The text of `anchor`'s block, if the metadata span still covers a block
/// whose last line carries that anchor.
fn anchored_block<'a>(
    metadata: &DocumentMetadata,
    anchor: &AnchorId,
    text: &'a str,
) -> Option<&'a str> {
    let block = metadata.block(anchor.as_str())?;
    let contents = block.span.slice(text)?;
    let last = contents.lines().last()?;
    (trailing_anchor(last) == Some(anchor.as_str())).then_some(contents)
}

impl std::fmt::Debug for DocumentReferenceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentReferenceProxy")
            .field("document", &self.document.path())
            .field("mode", &self.mode)
            .field("cached_handles", &self.cache.len())
            .finish()
    }
}
