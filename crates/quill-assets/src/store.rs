use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use quill_docref::{AccessMode, DocumentReferenceProxy, FsDocument, Notice};
use quill_handle::{HandleCache, HandleMinter};
use quill_store::{BlobStoreRegistry, KeyedBlobStore};
use quill_types::{
    sniff_mime, Address, Asset, AssetBlob, AssetSrc, ResolveContext, UploadResult, ASSET_SCHEME,
    BLOCK_REF_PREFIX,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::AssetsConfig;
use crate::error::AssetResult;

/// The editor-facing asset store for one drawing.
///
/// Uploads always go into the owning document as reference blocks. Resolution
/// dispatches on the address: block references go through the document
/// proxy, every other `asset:` address is read from the keyed blob store.
/// Resolution never fails loudly: anything that cannot be resolved is `None`.
pub struct AssetStore {
    proxy: DocumentReferenceProxy,
    registry: Arc<BlobStoreRegistry>,
    persistence_key: String,
    /// Opened at most once; `Some(None)` remembers an unavailable store.
    store: OnceCell<Option<Arc<dyn KeyedBlobStore>>>,
    cache: HandleCache,
}

impl AssetStore {
    pub fn new(
        proxy: DocumentReferenceProxy,
        registry: Arc<BlobStoreRegistry>,
        persistence_key: impl Into<String>,
        minter: Arc<dyn HandleMinter>,
    ) -> Self {
        Self {
            proxy,
            registry,
            persistence_key: persistence_key.into(),
            store: OnceCell::new(),
            cache: HandleCache::new(minter),
        }
    }

    /// An asset store over a markdown document on disk, wired from `config`.
    ///
    /// `registry` is shared by every store in the process; see
    /// [`AssetsConfig::store_registry`].
    pub fn open_fs(
        config: &AssetsConfig,
        document_path: impl AsRef<Path>,
        registry: Arc<BlobStoreRegistry>,
        minter: Arc<dyn HandleMinter>,
    ) -> AssetResult<Self> {
        config.validate()?;
        let mut document = FsDocument::new(document_path.as_ref());
        if let Some(folder) = &config.attachment_folder {
            document = document.with_attachment_folder(folder);
        }
        let document = Arc::new(document);
        let mode = if config.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::Editable
        };
        let proxy = DocumentReferenceProxy::with_mode(
            document.clone(),
            document,
            minter.clone(),
            mode,
        );
        Ok(Self::new(proxy, registry, config.persistence_key.clone(), minter))
    }

    pub fn proxy(&self) -> &DocumentReferenceProxy {
        &self.proxy
    }

    pub fn persistence_key(&self) -> &str {
        &self.persistence_key
    }

    /// Store `blob` in the owning document.
    ///
    /// The returned `src` is a block-reference address that resolves
    /// immediately. The only error surfaced is the proxy's, most notably
    /// permission denied on a read-only document.
    pub async fn upload(&self, asset: &Asset, blob: &AssetBlob) -> AssetResult<UploadResult> {
        let address = self.proxy.store_asset(blob).await?;
        info!(asset = %asset.id, src = %address, bytes = blob.len(), "asset uploaded");
        Ok(UploadResult {
            src: address.to_wire(),
        })
    }

    /// Resolve an asset's `src` to something the editor can load.
    ///
    /// Untagged sources pass through unchanged. Tagged ones come back as a
    /// handle URI, or `None` when the bytes cannot be found.
    pub async fn resolve(&self, asset: &Asset, _ctx: &ResolveContext) -> Option<String> {
        match asset.source() {
            AssetSrc::Empty => None,
            AssetSrc::External(url) => Some(url),
            AssetSrc::Malformed(src) => {
                let body = src.strip_prefix(ASSET_SCHEME).unwrap_or(&src);
                match body.strip_prefix(BLOCK_REF_PREFIX) {
                    // A block reference no document block could ever carry.
                    Some(id) => self.proxy.notify(Notice::AnchorMissing {
                        anchor: id.to_string(),
                    }),
                    None => debug!(asset = %asset.id, src, "unresolvable asset source"),
                }
                None
            }
            AssetSrc::Tagged(Address::BlockRef(anchor)) => self
                .proxy
                .resolve(&anchor)
                .await
                .map(|handle| handle.into_string()),
            AssetSrc::Tagged(address) => self
                .resolve_stored(address, asset.props.mime_type.as_deref())
                .await
                .map(|handle| handle.into_string()),
        }
    }

    async fn resolve_stored(
        &self,
        address: Address,
        mime_type: Option<&str>,
    ) -> Option<quill_handle::Handle> {
        if let Some(handle) = self.cache.get(&address) {
            debug!(%address, "handle cache hit");
            return Some(handle);
        }
        let store = self.keyed_store().await?;
        let Some(bytes) = store.fetch(&address.store_key()).await else {
            debug!(%address, "no bytes under store key");
            return None;
        };
        let mime = mime_type.or_else(|| sniff_mime(&bytes));
        Some(self.cache.mint(address, bytes, mime))
    }

    /// The keyed store, opened on first use. A failed open is never retried.
    async fn keyed_store(&self) -> Option<Arc<dyn KeyedBlobStore>> {
        self.store
            .get_or_init(|| async {
                let store = self.registry.open(&self.persistence_key).await;
                if store.is_none() {
                    warn!(
                        persistence_key = %self.persistence_key,
                        "keyed store unavailable; store-backed assets will not resolve"
                    );
                }
                store
            })
            .await
            .clone()
    }

    /// Wire sources of every reference block in the document.
    pub async fn list_document_sources(&self) -> AssetResult<Vec<String>> {
        let addresses = self.proxy.list_all().await?;
        Ok(addresses.iter().map(Address::to_wire).collect())
    }

    /// Wire sources of every entry in the keyed store, sorted.
    ///
    /// Empty when the store is unavailable. Keys that are not `asset:`
    /// addresses, and keys that fail to enumerate, are skipped.
    pub async fn list_store_sources(&self) -> Vec<String> {
        let Some(store) = self.keyed_store().await else {
            return Vec::new();
        };
        let mut sources = Vec::new();
        let mut keys = store.keys();
        while let Some(key) = keys.next().await {
            match key {
                Ok(key) => match Address::from_wire(&key) {
                    Ok(address) => sources.push(address.to_wire()),
                    Err(_) => debug!(key, "skipping non-asset store key"),
                },
                Err(e) => warn!(error = %e, "failed to enumerate store key"),
            }
        }
        sources.sort();
        sources
    }

    /// Revoke every handle this store and its proxy have minted. Idempotent.
    pub fn dispose(&self) {
        self.proxy.dispose();
        let revoked = self.cache.dispose_all();
        debug!(revoked, "asset store disposed");
    }
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore")
            .field("document", &self.proxy.document_path())
            .field("persistence_key", &self.persistence_key)
            .field("store_handles", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use proptest::prelude::*;
    use quill_docref::{AttachmentVault, MemoryDocument, RecordingNotifier};
    use quill_handle::{Handle, ObjectUrlRegistry};
    use quill_store::{FsBackend, MemoryBackend, StoreBackend, StoreError, StoreResult};

    const DRAWING: &str = "---\ntldraw-file: true\n---\n\n# Sketch\n";

    /// Refuses every connect and counts the attempts.
    #[derive(Default)]
    struct CountingBackend {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl StoreBackend for CountingBackend {
        async fn connect(&self, persistence_key: &str) -> StoreResult<Arc<dyn KeyedBlobStore>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable {
                key: persistence_key.to_string(),
                reason: "database blocked".into(),
            })
        }
    }

    /// Connects fine, but every read fails.
    struct FailingReads;

    #[async_trait]
    impl KeyedBlobStore for FailingReads {
        async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
            Err(StoreError::Io(std::io::Error::other("read error")))
        }

        fn keys(&self) -> futures_util::stream::BoxStream<'_, StoreResult<String>> {
            Box::pin(futures_util::stream::empty::<StoreResult<String>>())
        }
    }

    struct FailingReadsBackend;

    #[async_trait]
    impl StoreBackend for FailingReadsBackend {
        async fn connect(&self, _persistence_key: &str) -> StoreResult<Arc<dyn KeyedBlobStore>> {
            Ok(Arc::new(FailingReads))
        }
    }

    struct Fixture {
        doc: Arc<MemoryDocument>,
        urls: Arc<ObjectUrlRegistry>,
        backend: Arc<MemoryBackend>,
        notices: Arc<RecordingNotifier>,
        assets: AssetStore,
    }

    fn fixture_with(mode: AccessMode) -> Fixture {
        let doc = Arc::new(MemoryDocument::new("notes/sketch.md", DRAWING));
        let urls = Arc::new(ObjectUrlRegistry::new());
        let backend = Arc::new(MemoryBackend::new());
        let notices = Arc::new(RecordingNotifier::new());
        let proxy = DocumentReferenceProxy::with_mode(doc.clone(), doc.clone(), urls.clone(), mode)
            .with_notifier(notices.clone());
        let registry = Arc::new(BlobStoreRegistry::new(backend.clone()));
        let assets = AssetStore::new(proxy, registry, "quill-assets", urls.clone());
        Fixture {
            doc,
            urls,
            backend,
            notices,
            assets,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(AccessMode::Editable)
    }

    fn image(src: &str) -> Asset {
        Asset::new("shape:1", "image").with_src(src)
    }

    fn png(tag: u8) -> AssetBlob {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[tag, tag]);
        AssetBlob::new("pic", Some("image/png"), bytes)
    }

    fn deref(f: &Fixture, uri: &str) -> Bytes {
        f.urls.fetch(&Handle::new(uri)).expect("live handle").bytes
    }

    async fn upload(f: &Fixture, blob: &AssetBlob) -> String {
        f.assets
            .upload(&Asset::new("a", "image"), blob)
            .await
            .unwrap()
            .src
    }

    #[tokio::test]
    async fn upload_then_resolve_returns_same_bytes() {
        let f = fixture();
        let blob = png(1);
        let src = upload(&f, &blob).await;
        assert!(src.starts_with("asset:obsidian.blockref."));
        assert_eq!(src.len(), "asset:obsidian.blockref.".len() + 36);

        let uri = f.assets.resolve(&image(&src), &ResolveContext::default()).await.unwrap();
        assert_eq!(deref(&f, &uri), blob.bytes);
        assert_eq!(parse(&f.doc.text()), 1);
    }

    fn parse(text: &str) -> usize {
        quill_docref::parse_metadata(text).blocks.len()
    }

    #[tokio::test]
    async fn resolve_after_dispose_reads_document_again() {
        let f = fixture();
        let blob = png(2);
        let src = upload(&f, &blob).await;
        f.assets.dispose();
        assert_eq!(f.urls.live_count(), 0);

        let uri = f.assets.resolve(&image(&src), &ResolveContext::default()).await.unwrap();
        assert_eq!(deref(&f, &uri), blob.bytes);
    }

    #[tokio::test]
    async fn two_uploads_stay_separate() {
        let f = fixture();
        let a = upload(&f, &png(3)).await;
        let b = upload(&f, &png(4)).await;
        assert_ne!(a, b);
        f.assets.dispose();

        let ctx = ResolveContext::default();
        let ua = f.assets.resolve(&image(&a), &ctx).await.unwrap();
        let ub = f.assets.resolve(&image(&b), &ctx).await.unwrap();
        assert_eq!(deref(&f, &ua), png(3).bytes);
        assert_eq!(deref(&f, &ub), png(4).bytes);

        let mut listed = f.assets.list_document_sources().await.unwrap();
        listed.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn concurrent_uploads_insert_two_blocks() {
        let f = fixture();
        let (first, second) = (png(5), png(6));
        let (a, b) = tokio::join!(upload(&f, &first), upload(&f, &second));
        assert_ne!(a, b);
        assert_eq!(parse(&f.doc.text()), 2);
    }

    #[tokio::test]
    async fn deleted_reference_resolves_to_none() {
        let f = fixture();
        let src = upload(&f, &png(7)).await;
        f.assets.dispose();
        f.doc.set_text(DRAWING);

        assert!(f.assets.resolve(&image(&src), &ResolveContext::default()).await.is_none());
        assert!(matches!(
            f.notices.notices().as_slice(),
            [Notice::AnchorMissing { .. }]
        ));
    }

    #[tokio::test]
    async fn untagged_sources_pass_through() {
        let f = fixture();
        let ctx = ResolveContext::default();
        assert_eq!(f.assets.resolve(&image(""), &ctx).await, None);
        assert_eq!(f.assets.resolve(&image("asset:"), &ctx).await, None);
        assert_eq!(
            f.assets.resolve(&image("https://example.com/a.png"), &ctx).await.as_deref(),
            Some("https://example.com/a.png")
        );
    }

    #[tokio::test]
    async fn bad_block_reference_notifies() {
        let f = fixture();
        let ctx = ResolveContext::default();
        let src = "asset:obsidian.blockref.bad id";
        assert!(matches!(image(src).source(), AssetSrc::Malformed(_)));
        assert_eq!(f.assets.resolve(&image(src), &ctx).await, None);
        assert_eq!(
            f.notices.take(),
            vec![Notice::AnchorMissing {
                anchor: "bad id".into()
            }]
        );

        // Keyed-store misses stay quiet.
        assert_eq!(f.assets.resolve(&image("asset:missing"), &ctx).await, None);
        assert!(f.notices.take().is_empty());
    }

    #[tokio::test]
    async fn store_addresses_resolve_from_keyed_store() {
        let f = fixture();
        let store = f.backend.store("quill-assets");
        store.put("asset:legacy-1", Bytes::from_static(b"<svg/>"));

        let ctx = ResolveContext::default();
        let uri = f.assets.resolve(&image("asset:legacy-1"), &ctx).await.unwrap();
        let minted = f.urls.fetch(&Handle::new(uri.as_str())).unwrap();
        assert_eq!(minted.bytes, Bytes::from_static(b"<svg/>"));
        assert_eq!(minted.mime_type.as_deref(), Some("image/svg+xml"));

        // Cached: a second resolve returns the same handle.
        assert_eq!(f.assets.resolve(&image("asset:legacy-1"), &ctx).await, Some(uri));
        assert_eq!(f.assets.resolve(&image("asset:missing"), &ctx).await, None);
        assert_eq!(f.assets.list_store_sources().await, vec!["asset:legacy-1"]);

        f.assets.dispose();
        f.assets.dispose();
        assert_eq!(f.urls.live_count(), 0);
    }

    #[tokio::test]
    async fn failed_store_open_is_remembered() {
        let doc = Arc::new(MemoryDocument::new("d.md", DRAWING));
        let urls = Arc::new(ObjectUrlRegistry::new());
        let backend = Arc::new(CountingBackend::default());
        let proxy = DocumentReferenceProxy::new(doc.clone(), doc, urls.clone());
        let registry = Arc::new(BlobStoreRegistry::new(backend.clone()));
        let assets = AssetStore::new(proxy, registry, "quill-assets", urls);

        let ctx = ResolveContext::default();
        assert_eq!(assets.resolve(&image("asset:a"), &ctx).await, None);
        assert_eq!(assets.resolve(&image("asset:b"), &ctx).await, None);
        assert!(assets.list_store_sources().await.is_empty());
        assert_eq!(backend.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_read_failure_is_a_miss() {
        let doc = Arc::new(MemoryDocument::new("d.md", DRAWING));
        let urls = Arc::new(ObjectUrlRegistry::new());
        let proxy = DocumentReferenceProxy::new(doc.clone(), doc, urls.clone());
        let registry = Arc::new(BlobStoreRegistry::new(Arc::new(FailingReadsBackend)));
        let assets = AssetStore::new(proxy, registry, "quill-assets", urls.clone());

        let ctx = ResolveContext::default();
        assert_eq!(assets.resolve(&image("asset:legacy"), &ctx).await, None);
        assert!(assets.cache.is_empty());
        assert_eq!(urls.live_count(), 0);
    }

    #[tokio::test]
    async fn read_only_refuses_upload_but_resolves() {
        let f = fixture_with(AccessMode::ReadOnly);
        let err = f.assets.upload(&Asset::new("a", "image"), &png(8)).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(parse(&f.doc.text()), 0);

        f.doc.set_text("---\na: 1\n---\n![[x.png]]\n^fixed\n");
        f.doc
            .place("x.png", Bytes::from_static(b"GIF89a.."))
            .await
            .unwrap();
        let uri = f
            .assets
            .resolve(&image("asset:obsidian.blockref.fixed"), &ResolveContext::default())
            .await
            .unwrap();
        assert_eq!(deref(&f, &uri), Bytes::from_static(b"GIF89a.."));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let f = fixture();
        upload(&f, &png(9)).await;
        f.assets.dispose();
        f.assets.dispose();
        assert_eq!(f.urls.live_count(), 0);
    }

    #[tokio::test]
    async fn open_fs_wires_disk_backends() {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("sketch.md");
        std::fs::write(&doc_path, DRAWING).unwrap();
        let config = AssetsConfig {
            store_root: Some(dir.path().join("store")),
            attachment_folder: Some("att".into()),
            ..AssetsConfig::default()
        };

        let writer = FsBackend::new(dir.path().join("store"))
            .open_store(&config.persistence_key)
            .await
            .unwrap();
        writer.put("asset:imported", b"GIF89a").await.unwrap();

        let urls = Arc::new(ObjectUrlRegistry::new());
        let assets =
            AssetStore::open_fs(&config, &doc_path, config.store_registry(), urls.clone()).unwrap();
        let src = assets
            .upload(&Asset::new("a", "image"), &png(10))
            .await
            .unwrap()
            .src;
        assert_eq!(std::fs::read_dir(dir.path().join("att")).unwrap().count(), 1);
        assert_eq!(assets.list_document_sources().await.unwrap(), vec![src]);
        assert_eq!(assets.list_store_sources().await, vec!["asset:imported"]);

        let ctx = ResolveContext::default();
        let uri = assets.resolve(&image("asset:imported"), &ctx).await.unwrap();
        assert_eq!(
            urls.fetch(&Handle::new(uri.as_str())).unwrap().bytes,
            Bytes::from_static(b"GIF89a")
        );
    }

    #[tokio::test]
    async fn views_sharing_a_registry_share_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("sketch.md");
        std::fs::write(&doc_path, DRAWING).unwrap();
        let config = AssetsConfig::default();
        let backend = Arc::new(MemoryBackend::new());
        let registry = Arc::new(BlobStoreRegistry::new(backend.clone()));
        let urls = Arc::new(ObjectUrlRegistry::new());

        let first = AssetStore::open_fs(&config, &doc_path, registry.clone(), urls.clone()).unwrap();
        let second = AssetStore::open_fs(&config, &doc_path, registry.clone(), urls.clone()).unwrap();
        backend
            .store(&config.persistence_key)
            .put("asset:shared", Bytes::from_static(b"GIF89a"));

        assert_eq!(first.list_store_sources().await, vec!["asset:shared"]);
        assert_eq!(second.list_store_sources().await, vec!["asset:shared"]);
        assert_eq!(registry.open_count().await, 1);
        let ctx = ResolveContext::default();
        assert!(second.resolve(&image("asset:shared"), &ctx).await.is_some());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn uploaded_bytes_resolve_identically(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            name in "[a-zA-Z0-9 ._-]{1,24}",
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let f = fixture();
                let blob = AssetBlob::new(name, None, data.clone());
                let src = upload(&f, &blob).await;
                f.assets.dispose();
                let uri = f.assets.resolve(&image(&src), &ResolveContext::default()).await.unwrap();
                assert_eq!(deref(&f, &uri).to_vec(), data);
            });
        }
    }
}
