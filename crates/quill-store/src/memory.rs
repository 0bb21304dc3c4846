use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyedBlobStore, StoreBackend};

/// In-memory, HashMap-based keyed blob store.
///
/// Intended for tests and embedding. Entries live behind a `RwLock`; `Bytes`
/// makes reads cheap clones of the stored buffer.
pub struct InMemoryBlobStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the bytes under `key`.
    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.into(), bytes.into());
    }

    /// Remove an entry. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyedBlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn keys(&self) -> BoxStream<'_, StoreResult<String>> {
        // Snapshot at enumeration start; sorted for stable output.
        let mut keys: Vec<String> = self
            .entries
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        stream::iter(keys.into_iter().map(Ok)).boxed()
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("entry_count", &self.len())
            .finish()
    }
}

/// Backend handing out one [`InMemoryBlobStore`] per persistence key.
#[derive(Default)]
pub struct MemoryBackend {
    stores: RwLock<HashMap<String, Arc<InMemoryBlobStore>>>,
    unavailable: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every `connect` fails, as when the database is missing.
    pub fn unavailable() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            unavailable: true,
        }
    }

    /// The store for `persistence_key`, created empty on first use.
    ///
    /// External writers use this to seed entries.
    pub fn store(&self, persistence_key: &str) -> Arc<InMemoryBlobStore> {
        let mut stores = self.stores.write().expect("lock poisoned");
        stores
            .entry(persistence_key.to_string())
            .or_insert_with(|| Arc::new(InMemoryBlobStore::new()))
            .clone()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn connect(&self, persistence_key: &str) -> StoreResult<Arc<dyn KeyedBlobStore>> {
        if self.unavailable {
            return Err(StoreError::Unavailable {
                key: persistence_key.to_string(),
                reason: "backend is unavailable".into(),
            });
        }
        let store: Arc<dyn KeyedBlobStore> = self.store(persistence_key);
        Ok(store)
    }
}
