//! Foundation types for Quill.
//!
//! Every other Quill crate depends on `quill-types`.
//!
//! # Key Types
//!
//! - [`Asset`]: the editor's record of a binary resource
//! - [`AssetBlob`]: bytes handed to an upload
//! - [`Address`]: tagged asset address (document block reference or keyed store entry)
//! - [`AssetSrc`]: classification of a raw `src` string
//! - [`AnchorId`]: block anchor identifier inside a host document

pub mod address;
pub mod asset;
pub mod error;
pub mod mime;

pub use address::{is_anchor_char, Address, AnchorId, AssetSrc, ASSET_SCHEME, BLOCK_REF_PREFIX};
pub use asset::{Asset, AssetBlob, AssetProps, ResolveContext, UploadResult};
pub use error::TypeError;
pub use mime::{extension_for_mime, sniff_mime};
