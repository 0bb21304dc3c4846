//! Ephemeral asset handles for Quill.
//!
//! A [`Handle`] is a transient, process-local URI that lets the editor read
//! the bytes behind an address without fetching them again. Handles hold
//! resources until revoked, so every handle minted for a document is owned
//! by exactly one [`HandleCache`] entry and released when that cache is
//! disposed.
//!
//! - [`HandleMinter`]: mints and revokes handles
//! - [`ObjectUrlRegistry`]: in-process minter that can also dereference handles
//! - [`HandleCache`]: address-to-handle map, unbounded, disposed as a whole

pub mod cache;
pub mod handle;

pub use cache::{CacheEntry, HandleCache};
pub use handle::{Handle, HandleMinter, MintedObject, ObjectUrlRegistry, HANDLE_SCHEME};
