//! # quill-assets
//!
//! The asset store a drawing editor talks to. [`AssetStore::upload`] embeds
//! new assets in the owning document; [`AssetStore::resolve`] turns any
//! `asset:` source back into a loadable handle, whether it points into the
//! document or into the keyed blob store that older sessions and external
//! tools write to.

pub mod config;
pub mod error;
pub mod store;

pub use config::{AssetsConfig, DEFAULT_PERSISTENCE_KEY};
pub use error::{AssetError, AssetResult};
pub use store::AssetStore;

pub use quill_types::{Address, Asset, AssetBlob, AssetSrc, ResolveContext, UploadResult};
