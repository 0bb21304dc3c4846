//! Filesystem-backed keyed blob store.
//!
//! Layout: one file per key directly under the store directory. The file
//! name is the lowercase hex encoding of the key, so arbitrary key strings
//! (including `:` and `/`) map to portable names.
//!
//! ```text
//! <root>/<persistence key>/
//!     61737365743a6162.....   <- hex("asset:ab...")
//!     .61737365743a61.3.tmp   <- in-flight write, ignored by readers
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyedBlobStore, StoreBackend};

/// Longest key accepted, in bytes. Hex doubles it; most filesystems cap
/// names at 255 bytes.
pub const MAX_KEY_LEN: usize = 120;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A directory of key-named files.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened fs blob store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `key`, atomically replacing any previous entry.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(".{}.{n}.tmp", hex::encode(key)));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove an entry. Returns `true` if it existed.
    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must not be empty".into(),
            });
        }
        if key.len() > MAX_KEY_LEN {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: format!("key longer than {MAX_KEY_LEN} bytes"),
            });
        }
        Ok(self.root.join(hex::encode(key)))
    }
}

/// Decode a directory entry name back into its key.
///
/// Temporary files and foreign names yield `None`.
fn decode_file_name(name: &str) -> Option<String> {
    if name.starts_with('.') {
        return None;
    }
    let raw = hex::decode(name).ok()?;
    String::from_utf8(raw).ok()
}

enum Cursor {
    Start(PathBuf),
    Reading(fs::ReadDir),
    Done,
}

#[async_trait]
impl KeyedBlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let path = match self.path_for(key) {
            Ok(path) => path,
            // Keys this backend cannot hold are simply absent.
            Err(StoreError::InvalidKey { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> BoxStream<'_, StoreResult<String>> {
        stream::unfold(Cursor::Start(self.root.clone()), |cursor| async move {
            let mut dir = match cursor {
                Cursor::Start(root) => match fs::read_dir(&root).await {
                    Ok(dir) => dir,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
                    Err(e) => return Some((Err(e.into()), Cursor::Done)),
                },
                Cursor::Reading(dir) => dir,
                Cursor::Done => return None,
            };
            loop {
                match dir.next_entry().await {
                    Ok(Some(entry)) => {
                        let name = entry.file_name();
                        let Some(name) = name.to_str() else { continue };
                        match decode_file_name(name) {
                            Some(key) => return Some((Ok(key), Cursor::Reading(dir))),
                            None if !name.starts_with('.') => {
                                warn!(name, "skipping foreign file in blob store");
                            }
                            None => {}
                        }
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(e.into()), Cursor::Done)),
                }
            }
        })
        .boxed()
    }
}

/// Backend mapping each persistence key to a subdirectory of `root`.
#[derive(Clone, Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory that holds the store for `persistence_key`.
    pub fn store_dir(&self, persistence_key: &str) -> Option<PathBuf> {
        let name = sanitize_persistence_key(persistence_key)?;
        Some(self.root.join(name))
    }

    /// Open the concrete store (for writers that need [`FsBlobStore::put`]).
    pub async fn open_store(&self, persistence_key: &str) -> StoreResult<FsBlobStore> {
        let dir = self
            .store_dir(persistence_key)
            .ok_or_else(|| StoreError::Unavailable {
                key: persistence_key.to_string(),
                reason: "persistence key has no usable characters".into(),
            })?;
        FsBlobStore::open(&dir)
            .await
            .map_err(|e| StoreError::Unavailable {
                key: persistence_key.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl StoreBackend for FsBackend {
    async fn connect(&self, persistence_key: &str) -> StoreResult<Arc<dyn KeyedBlobStore>> {
        let store: Arc<dyn KeyedBlobStore> = Arc::new(self.open_store(persistence_key).await?);
        Ok(store)
    }
}

/// Map a persistence key onto a single safe path component.
fn sanitize_persistence_key(key: &str) -> Option<String> {
    let name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_matches('.');
    if name.is_empty() || name.chars().all(|c| c == '_') {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store.put("asset:abc", b"payload").await.unwrap();

        let bytes = store.get("asset:abc").await.unwrap().expect("should exist");
        assert_eq!(&bytes[..], b"payload");
        assert!(store.get("asset:other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FsBlobStore::open(dir.path()).await.unwrap();
            store.put("asset:keep", b"durable").await.unwrap();
        }
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        assert_eq!(&store.get("asset:keep").await.unwrap().unwrap()[..], b"durable");
    }

    #[tokio::test]
    async fn keys_skip_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store.put("asset:one", b"1").await.unwrap();
        store.put("asset:two", b"2").await.unwrap();
        std::fs::write(dir.path().join(".deadbeef.0.tmp"), b"x").unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();

        let mut keys: Vec<String> = store.keys().try_collect().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["asset:one".to_string(), "asset:two".to_string()]);
    }

    #[tokio::test]
    async fn keys_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("s")).await.unwrap();
        std::fs::remove_dir(store.root()).unwrap();
        let keys: Vec<String> = store.keys().try_collect().await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn remove_and_invalid_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();
        store.put("k", b"v").await.unwrap();
        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());

        assert!(matches!(
            store.put("", b"v").await,
            Err(StoreError::InvalidKey { .. })
        ));
        let long = "x".repeat(MAX_KEY_LEN + 1);
        assert!(store.put(&long, b"v").await.is_err());
        assert!(store.get(&long).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_separates_persistence_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        backend
            .open_store("drawing-1")
            .await
            .unwrap()
            .put("asset:a", b"a")
            .await
            .unwrap();

        let one = backend.connect("drawing-1").await.unwrap();
        let two = backend.connect("drawing-2").await.unwrap();
        assert!(one.get("asset:a").await.unwrap().is_some());
        assert!(two.get("asset:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backend_unavailable_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let backend = FsBackend::new(&file);
        let err = backend.connect("doc").await.err().expect("should fail");
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn sanitize_keys() {
        assert_eq!(sanitize_persistence_key("my/doc:1").as_deref(), Some("my_doc_1"));
        assert_eq!(sanitize_persistence_key("..").as_deref(), None);
        assert_eq!(sanitize_persistence_key("//").as_deref(), None);
    }
}
