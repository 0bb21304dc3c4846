//! Attachment naming.
//!
//! Object names are `<anchor>-<suggested name>` with every character outside
//! `[A-Za-z0-9_]` replaced by `-`, so the stored file is traceable to its
//! block and safe on any filesystem. The extension comes from the blob's
//! content type, never from the suggested name.

use quill_types::{extension_for_mime, AnchorId};

/// Sanitized object name for an asset, without extension.
pub fn object_name(anchor: &AnchorId, suggested: &str) -> String {
    format!("{anchor}-{suggested}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}

/// File name to place an asset under: object name plus an extension
/// inferred from `mime_type`, when one can be inferred.
pub fn attachment_filename(anchor: &AnchorId, suggested: &str, mime_type: Option<&str>) -> String {
    let name = object_name(anchor, suggested);
    let ext: Option<String> = mime_type
        .and_then(extension_for_mime)
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
                .collect()
        })
        .filter(|ext: &String| !ext.is_empty());
    match ext {
        Some(ext) => format!("{name}.{ext}"),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn anchor() -> AnchorId {
        AnchorId::parse("1234-abcd").unwrap()
    }

    #[test]
    fn sanitizes_suggested_name() {
        assert_eq!(object_name(&anchor(), "my pic.png"), "1234-abcd-my-pic-png");
        assert_eq!(object_name(&anchor(), "a/b\\c:d"), "1234-abcd-a-b-c-d");
        assert_eq!(object_name(&anchor(), "snake_case"), "1234-abcd-snake_case");
    }

    #[test]
    fn extension_from_content_type() {
        assert_eq!(
            attachment_filename(&anchor(), "pic", Some("image/png")),
            "1234-abcd-pic.png"
        );
        assert_eq!(
            attachment_filename(&anchor(), "logo", Some("image/svg+xml")),
            "1234-abcd-logo.svg"
        );
        assert_eq!(attachment_filename(&anchor(), "raw", None), "1234-abcd-raw");
        assert_eq!(attachment_filename(&anchor(), "raw", Some("weird")), "1234-abcd-raw");
    }

    proptest! {
        #[test]
        fn object_names_are_word_chars_only(name in ".{0,40}") {
            let out = object_name(&anchor(), &name);
            prop_assert!(out.starts_with("1234-abcd-"));
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }
    }
}
