//! Link extraction from a reference block's text.
//!
//! Recognised forms, first match wins:
//! - wiki links: `[[target]]`, `![[target|alias]]`, `[[target#heading]]`
//! - markdown links: `[text](target)`, `![alt](<target with spaces>)`

/// Extract the first link target in `text`.
pub fn extract_link(text: &str) -> Option<String> {
    wiki_link(text).or_else(|| markdown_link(text))
}

fn wiki_link(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find("[[") {
        let after = &rest[open + 2..];
        let close = after.find("]]")?;
        let inner = &after[..close];
        if !inner.contains('\n') {
            let target = inner.split('|').next().unwrap_or(inner);
            let target = target.split('#').next().unwrap_or(target).trim();
            if !target.is_empty() {
                return Some(target.to_string());
            }
        }
        rest = &after[close + 2..];
    }
    None
}

fn markdown_link(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find("](") {
        let after = &rest[open + 2..];
        let close = after.find(')')?;
        let inner = after[..close].trim();
        let inner = inner
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(inner);
        if !inner.is_empty() && !inner.contains('\n') {
            return Some(percent_decode(inner));
        }
        rest = &after[close + 1..];
    }
    None
}

/// Decode `%XX` escapes; malformed escapes are kept verbatim.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiki_links() {
        assert_eq!(extract_link("![[pic.png]]\n^abc").as_deref(), Some("pic.png"));
        assert_eq!(extract_link("[[folder/pic.png|shown]]").as_deref(), Some("folder/pic.png"));
        assert_eq!(extract_link("[[note#section]]").as_deref(), Some("note"));
    }

    #[test]
    fn empty_wiki_link_falls_through() {
        assert_eq!(extract_link("[[]] then [[real.png]]").as_deref(), Some("real.png"));
        assert_eq!(extract_link("[[ ]]"), None);
    }

    #[test]
    fn markdown_links() {
        assert_eq!(extract_link("![alt](img/pic.png)").as_deref(), Some("img/pic.png"));
        assert_eq!(extract_link("[a](<my pic.png>)").as_deref(), Some("my pic.png"));
        assert_eq!(extract_link("[a](my%20pic.png)").as_deref(), Some("my pic.png"));
    }

    #[test]
    fn wiki_link_preferred_over_markdown() {
        assert_eq!(extract_link("[a](x.png) ![[y.png]]").as_deref(), Some("y.png"));
    }

    #[test]
    fn no_link() {
        assert_eq!(extract_link("^abc"), None);
        assert_eq!(extract_link("[[unterminated"), None);
        assert_eq!(extract_link("[[multi\nline]]"), None);
    }

    #[test]
    fn malformed_escapes_are_kept() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%41"), "A");
    }
}
