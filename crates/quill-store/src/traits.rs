use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::StoreResult;

/// Persistent, keyed binary object store.
///
/// All implementations must satisfy these invariants:
/// - Lookups are by exact key match. A missing key is `Ok(None)`, never an error.
/// - Concurrent reads are always safe.
/// - The store never interprets the bytes it holds.
#[async_trait]
pub trait KeyedBlobStore: Send + Sync {
    /// Read the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` if no entry exists.
    /// Returns `Err` only when the backend itself fails.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Lazily enumerate every key.
    ///
    /// The stream is finite. Calling `keys()` again restarts the enumeration;
    /// writes that race with an enumeration may or may not be observed.
    fn keys(&self) -> BoxStream<'_, StoreResult<String>>;

    /// Read `key`, logging and absorbing backend failures as a missing entry.
    async fn fetch(&self, key: &str) -> Option<Bytes> {
        match self.get(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "blob read failed, treating as missing");
                None
            }
        }
    }
}

/// Opens keyed stores by persistence key.
///
/// A backend may fail to open (database missing, permissions, quota); it
/// reports that as [`StoreError::Unavailable`](crate::StoreError::Unavailable).
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn connect(&self, persistence_key: &str) -> StoreResult<Arc<dyn KeyedBlobStore>>;
}
