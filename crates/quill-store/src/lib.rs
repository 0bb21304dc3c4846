//! Keyed blob storage for Quill.
//!
//! Holds asset bytes out of band from the host document, addressed by an
//! opaque key (the asset's full `asset:` source string). No write originates
//! from the resolution path; stores are filled by external contexts.
//!
//! # Storage Backends
//!
//! All stores implement the [`KeyedBlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlobStore`] -- one hex-named file per key, durable across restarts
//!
//! Stores are opened per persistence key through a [`StoreBackend`]
//! ([`MemoryBackend`], [`FsBackend`]); [`BlobStoreRegistry`] memoizes opens
//! and turns open failures into "store unavailable".
//!
//! # Design Rules
//!
//! 1. A missing key is `None`, never an error.
//! 2. Per-key read failures are logged and treated as missing ([`KeyedBlobStore::fetch`]).
//! 3. Opening a store fails soft.
//! 4. The store never interprets the bytes it holds.

pub mod error;
pub mod fs;
pub mod memory;
pub mod registry;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsBackend, FsBlobStore};
pub use memory::{InMemoryBlobStore, MemoryBackend};
pub use registry::BlobStoreRegistry;
pub use traits::{KeyedBlobStore, StoreBackend};
