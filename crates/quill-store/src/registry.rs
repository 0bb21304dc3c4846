use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::traits::{KeyedBlobStore, StoreBackend};

/// Process-wide entry point for opening keyed stores.
///
/// Opening is idempotent: the first successful open of a persistence key is
/// memoized and every later open of the same key returns the same instance.
/// Failures are not memoized here; callers decide whether to retry.
pub struct BlobStoreRegistry {
    backend: Arc<dyn StoreBackend>,
    open: Mutex<HashMap<String, Arc<dyn KeyedBlobStore>>>,
}

impl BlobStoreRegistry {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Open the store for `persistence_key`.
    ///
    /// Fails soft: a backend error is logged and reported as `None`, meaning
    /// "store unavailable". It is never fatal to the caller.
    pub async fn open(&self, persistence_key: &str) -> Option<Arc<dyn KeyedBlobStore>> {
        // Held across connect so two racing opens of one key share a store.
        let mut open = self.open.lock().await;
        if let Some(store) = open.get(persistence_key) {
            return Some(store.clone());
        }
        match self.backend.connect(persistence_key).await {
            Ok(store) => {
                debug!(persistence_key, "keyed blob store opened");
                open.insert(persistence_key.to_string(), store.clone());
                Some(store)
            }
            Err(e) => {
                warn!(persistence_key, error = %e, "keyed blob store unavailable");
                None
            }
        }
    }

    /// Number of stores opened so far.
    pub async fn open_count(&self) -> usize {
        self.open.lock().await.len()
    }
}

impl std::fmt::Debug for BlobStoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStoreRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn same_key_returns_same_store() {
        let registry = BlobStoreRegistry::new(Arc::new(MemoryBackend::new()));
        let a = registry.open("doc").await.unwrap();
        let b = registry.open("doc").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.open_count().await, 1);
    }

    #[tokio::test]
    async fn failed_open_is_none() {
        let registry = BlobStoreRegistry::new(Arc::new(MemoryBackend::unavailable()));
        assert!(registry.open("doc").await.is_none());
        assert_eq!(registry.open_count().await, 0);
    }
}
