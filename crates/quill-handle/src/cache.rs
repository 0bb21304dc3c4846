use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use quill_types::Address;
use tracing::debug;

use crate::handle::{Handle, HandleMinter};

/// A resolved address and the handle that owns its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub address: Address,
    pub handle: Handle,
    pub created_at: DateTime<Utc>,
}

/// Address-to-handle map with revocation bookkeeping.
///
/// Each entry owns exactly one handle. Entries are never evicted
/// individually: the cache lives as long as its owning proxy or store and
/// [`dispose_all`](Self::dispose_all) is the single release point.
pub struct HandleCache {
    minter: Arc<dyn HandleMinter>,
    entries: RwLock<HashMap<Address, CacheEntry>>,
}

impl HandleCache {
    pub fn new(minter: Arc<dyn HandleMinter>) -> Self {
        Self {
            minter,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, address: &Address) -> Option<Handle> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(address)
            .map(|entry| entry.handle.clone())
    }

    /// Cache `handle` under `address` and return the handle now cached.
    ///
    /// The first insert for an address wins. When two cold resolutions race,
    /// the loser's handle is revoked immediately so nothing leaks.
    pub fn insert(&self, address: Address, handle: Handle) -> Handle {
        let mut entries = self.entries.write().expect("lock poisoned");
        if let Some(existing) = entries.get(&address) {
            let cached = existing.handle.clone();
            drop(entries);
            if cached != handle {
                self.minter.revoke(&handle);
            }
            return cached;
        }
        entries.insert(
            address.clone(),
            CacheEntry {
                address,
                handle: handle.clone(),
                created_at: Utc::now(),
            },
        );
        handle
    }

    /// Mint a handle for `bytes` and cache it under `address`.
    pub fn mint(&self, address: Address, bytes: Bytes, mime_type: Option<&str>) -> Handle {
        let handle = self.minter.mint(bytes, mime_type);
        self.insert(address, handle)
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Revoke every handle, then clear the map. Idempotent.
    ///
    /// Returns the number of handles revoked by this call.
    pub fn dispose_all(&self) -> usize {
        let drained: Vec<CacheEntry> = {
            let mut entries = self.entries.write().expect("lock poisoned");
            entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            self.minter.revoke(&entry.handle);
        }
        if !drained.is_empty() {
            debug!(revoked = drained.len(), "handle cache disposed");
        }
        drained.len()
    }
}

impl std::fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field("entries", &self.len())
            .finish()
    }
}
