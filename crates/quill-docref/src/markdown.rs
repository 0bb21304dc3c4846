//! Minimal markdown addressing: front matter, block anchors, and the
//! reference-block insert.
//!
//! Only what is needed to locate a stored reference is parsed:
//! - Front matter is a leading `---` line closed by a later `---` line. Its
//!   span ends at the end of the closing delimiter, newline excluded.
//! - A block is a paragraph (a run of non-blank lines). A paragraph whose
//!   last line ends in `^id`, preceded by start of line or whitespace, is
//!   addressable as block `id`. Fenced code is never a block.

use std::collections::BTreeMap;

use quill_types::{is_anchor_char, AnchorId};

use crate::types::{BlockAnchor, DocumentMetadata, Span};

const FRONTMATTER_DELIMITER: &str = "---";

/// Iterate lines with the byte offset at which each starts.
///
/// The yielded line excludes its `\n` / `\r\n` terminator.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        (start, line)
    })
}

/// Span of the leading front-matter block, if the document has one.
pub fn frontmatter_span(text: &str) -> Option<Span> {
    let mut lines = lines_with_offsets(text);
    let (_, first) = lines.next()?;
    if first.trim_end() != FRONTMATTER_DELIMITER {
        return None;
    }
    for (start, line) in lines {
        if line.trim_end() == FRONTMATTER_DELIMITER {
            return Some(Span::new(0, start + FRONTMATTER_DELIMITER.len()));
        }
    }
    None
}

/// The anchor id a line ends with, if any.
pub fn trailing_anchor(line: &str) -> Option<&str> {
    let line = line.trim_end();
    let caret = line.rfind('^')?;
    let id = &line[caret + 1..];
    if id.is_empty() || !id.chars().all(is_anchor_char) {
        return None;
    }
    let before = &line[..caret];
    match before.chars().last() {
        None => Some(id),
        Some(c) if c.is_whitespace() => Some(id),
        Some(_) => None,
    }
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("```") || line.starts_with("~~~")
}

/// Parse the addressing metadata of a markdown document.
pub fn parse_metadata(text: &str) -> DocumentMetadata {
    let frontmatter = frontmatter_span(text);
    let body_start = frontmatter.map(|s| s.end).unwrap_or(0);

    let mut blocks = BTreeMap::new();
    let mut paragraph: Option<(Span, &str)> = None;
    let mut in_fence = false;

    let mut close = |paragraph: &mut Option<(Span, &str)>| {
        if let Some((span, last_line)) = paragraph.take() {
            if let Some(id) = trailing_anchor(last_line) {
                blocks.insert(
                    id.to_string(),
                    BlockAnchor {
                        id: id.to_string(),
                        span,
                    },
                );
            }
        }
    };

    for (start, line) in lines_with_offsets(text) {
        if start < body_start {
            continue;
        }
        if is_fence(line) {
            close(&mut paragraph);
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if line.trim().is_empty() {
            close(&mut paragraph);
            continue;
        }
        let end = start + line.len();
        paragraph = match paragraph {
            Some((span, _)) => Some((Span::new(span.start, end), line)),
            None => Some((Span::new(start, end), line)),
        };
    }
    close(&mut paragraph);

    DocumentMetadata {
        frontmatter,
        blocks,
    }
}

/// Text of a reference block: the link followed by the anchor marker.
pub fn reference_block(link: &str, anchor: &AnchorId) -> String {
    format!("{link}\n^{anchor}")
}

/// Insert `block` immediately after the front matter (or at the very start
/// when there is none), as its own paragraph.
///
/// Only inserts; every existing byte of `text` is preserved in order.
pub fn insert_after_frontmatter(text: &str, block: &str) -> String {
    let at = frontmatter_span(text).map(|s| s.end).unwrap_or(0);
    let (head, rest) = text.split_at(at);
    // Keep the block from merging into a paragraph that starts right after it.
    let gap = if rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n") {
        ""
    } else {
        "\n"
    };
    format!("{head}\n{block}\n{gap}{rest}")
}
