use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_store::{BlobStoreRegistry, FsBackend, MemoryBackend, StoreBackend};
use serde::{Deserialize, Serialize};

use crate::error::{AssetError, AssetResult};

pub const DEFAULT_PERSISTENCE_KEY: &str = "quill-assets";

/// Settings for an [`AssetStore`](crate::AssetStore) over files on disk.
///
/// ```toml
/// persistence_key = "my-vault"
/// store_root = "/var/lib/quill"
/// attachment_folder = "attachments"
/// read_only = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Names the keyed blob store shared with external writers.
    pub persistence_key: String,
    /// Root directory of the keyed blob store. `None` keeps it in memory.
    pub store_root: Option<PathBuf>,
    /// Where attachments are placed, relative to the document's directory.
    pub attachment_folder: Option<PathBuf>,
    pub read_only: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            persistence_key: DEFAULT_PERSISTENCE_KEY.to_string(),
            store_root: None,
            attachment_folder: None,
            read_only: false,
        }
    }
}

impl AssetsConfig {
    pub fn from_toml_str(s: &str) -> AssetResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> AssetResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// A registry over the configured store backend.
    ///
    /// Without a `store_root` the store is in memory and starts empty. Every
    /// [`AssetStore`](crate::AssetStore) in a process should share one
    /// registry so that opening a persistence key yields one store.
    pub fn store_registry(&self) -> Arc<BlobStoreRegistry> {
        let backend: Arc<dyn StoreBackend> = match &self.store_root {
            Some(root) => Arc::new(FsBackend::new(root)),
            None => Arc::new(MemoryBackend::new()),
        };
        Arc::new(BlobStoreRegistry::new(backend))
    }

    pub fn validate(&self) -> AssetResult<()> {
        if self.persistence_key.trim().is_empty() {
            return Err(AssetError::Config("persistence_key must not be empty".into()));
        }
        if let Some(folder) = &self.attachment_folder {
            if folder.is_absolute() {
                return Err(AssetError::Config(format!(
                    "attachment_folder must be relative to the document: {}",
                    folder.display()
                )));
            }
        }
        Ok(())
    }
}
