use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use bytes::Bytes;

/// URI scheme of handles minted by [`ObjectUrlRegistry`].
pub const HANDLE_SCHEME: &str = "blob:quill/";

/// Ephemeral, process-local reference to a set of bytes.
///
/// A handle stays dereferenceable until it is revoked. Handles are never
/// persisted; addresses are.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints and revokes handles for byte payloads.
///
/// Every minted handle holds process resources until revoked. Revoking an
/// unknown or already revoked handle is a no-op that returns `false`.
pub trait HandleMinter: Send + Sync {
    fn mint(&self, bytes: Bytes, mime_type: Option<&str>) -> Handle;

    fn revoke(&self, handle: &Handle) -> bool;
}

/// Bytes held behind a live handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintedObject {
    pub bytes: Bytes,
    pub mime_type: Option<String>,
}

/// In-process object-URL table: `blob:quill/<uuid>` to bytes.
#[derive(Default)]
pub struct ObjectUrlRegistry {
    objects: RwLock<HashMap<String, MintedObject>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dereference a live handle.
    pub fn fetch(&self, handle: &Handle) -> Option<MintedObject> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(handle.as_str())
            .cloned()
    }

    /// Number of handles minted and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }
}

impl HandleMinter for ObjectUrlRegistry {
    fn mint(&self, bytes: Bytes, mime_type: Option<&str>) -> Handle {
        let uri = format!("{HANDLE_SCHEME}{}", uuid::Uuid::new_v4());
        let object = MintedObject {
            bytes,
            mime_type: mime_type.map(str::to_string),
        };
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(uri.clone(), object);
        Handle(uri)
    }

    fn revoke(&self, handle: &Handle) -> bool {
        self.objects
            .write()
            .expect("lock poisoned")
            .remove(handle.as_str())
            .is_some()
    }
}

impl fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrlRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_fetch_revoke() {
        let registry = ObjectUrlRegistry::new();
        let handle = registry.mint(Bytes::from_static(b"abc"), Some("image/png"));
        assert!(handle.as_str().starts_with(HANDLE_SCHEME));

        let object = registry.fetch(&handle).expect("live handle");
        assert_eq!(&object.bytes[..], b"abc");
        assert_eq!(object.mime_type.as_deref(), Some("image/png"));

        assert!(registry.revoke(&handle));
        assert!(registry.fetch(&handle).is_none());
        assert!(!registry.revoke(&handle));
    }

    #[test]
    fn handles_are_unique_per_mint() {
        let registry = ObjectUrlRegistry::new();
        let a = registry.mint(Bytes::from_static(b"same"), None);
        let b = registry.mint(Bytes::from_static(b"same"), None);
        assert_ne!(a, b);
        assert_eq!(registry.live_count(), 2);
    }
}
