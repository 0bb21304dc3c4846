//! Content-type helpers: extension lookup and magic-number sniffing.

/// File extension for a content type, taken from its subtype.
///
/// Structured-syntax suffixes are dropped, so `image/svg+xml` maps to `svg`.
/// Parameters (`; charset=...`) are ignored.
pub fn extension_for_mime(mime: &str) -> Option<&str> {
    let essence = mime.split(';').next()?.trim();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.split('+').next()?.trim();
    if subtype.is_empty() {
        None
    } else {
        Some(subtype)
    }
}

/// Guess a content type from the leading bytes of a payload.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.starts_with(PNG) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if looks_like_svg(bytes) {
        return Some("image/svg+xml");
    }
    None
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with("<svg") {
        return true;
    }
    // An XML prolog may precede the root element.
    text.starts_with("<?xml") && text.contains("<svg")
}
