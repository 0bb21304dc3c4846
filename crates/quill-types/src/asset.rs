use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::AssetSrc;

/// Logical record of a binary resource, owned by the editor's document model.
///
/// Quill reads `props.src` and produces a new `src` on upload; it never
/// mutates the record itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Opaque editor-assigned identifier.
    pub id: String,
    /// Mime-like asset type (`"image"`, `"video"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub props: AssetProps,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetProps {
    /// Address string; empty before the first upload.
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Asset {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: AssetProps::default(),
        }
    }

    /// Builder-style helper that sets `props.src`.
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.props.src = src.into();
        self
    }

    /// Classify this asset's source address.
    pub fn source(&self) -> AssetSrc {
        AssetSrc::parse(&self.props.src)
    }
}

/// An uploaded file: name, declared content type and bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetBlob {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

impl AssetBlob {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rendering hints the editor passes along with a resolve request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolveContext {
    pub screen_scale: f64,
    pub device_pixel_ratio: f64,
    pub should_resolve_to_original: bool,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            screen_scale: 1.0,
            device_pixel_ratio: 1.0,
            should_resolve_to_original: false,
        }
    }
}

/// Result of an upload: the address the editor stores in `props.src`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub src: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_serializes_with_editor_field_names() {
        let mut asset = Asset::new("asset:1", "image").with_src("asset:obsidian.blockref.x");
        asset.props.mime_type = Some("image/png".into());
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["props"]["mimeType"], "image/png");
        assert_eq!(json["props"]["src"], "asset:obsidian.blockref.x");
    }

    #[test]
    fn missing_src_deserializes_empty() {
        let asset: Asset =
            serde_json::from_str(r#"{"id":"a","type":"image","props":{}}"#).unwrap();
        assert!(asset.props.src.is_empty());
        assert_eq!(asset.source(), AssetSrc::Empty);
    }

    #[test]
    fn blob_length() {
        let blob = AssetBlob::new("pic", Some("image/png"), vec![1u8, 2, 3]);
        assert_eq!(blob.len(), 3);
        assert!(!blob.is_empty());
        assert_eq!(blob.mime_type.as_deref(), Some("image/png"));
    }
}
