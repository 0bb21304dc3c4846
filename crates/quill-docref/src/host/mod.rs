//! Host implementations of [`HostDocument`](crate::HostDocument) and
//! [`AttachmentVault`](crate::AttachmentVault).

mod fs;
mod memory;

pub use fs::FsDocument;
pub use memory::MemoryDocument;

/// The wiki-style embed that hosts write into reference blocks.
pub(crate) fn embed_link(file_name: &str) -> String {
    format!("![[{file_name}]]")
}

/// Split `filename` into stem and extension (dot excluded).
fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => (&filename[..dot], Some(&filename[dot + 1..])),
        _ => (filename, None),
    }
}

/// The `n`th candidate for `filename`: the name itself, then `stem 1.ext`,
/// `stem 2.ext`, and so on.
pub(crate) fn candidate_name(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match split_extension(filename) {
        (stem, Some(ext)) => format!("{stem} {n}.{ext}"),
        (stem, None) => format!("{stem} {n}"),
    }
}

/// First candidate name not reported as taken.
pub(crate) fn available_name(filename: &str, taken: impl Fn(&str) -> bool) -> String {
    (0..)
        .map(|n| candidate_name(filename, n))
        .find(|name| !taken(name))
        .unwrap_or_else(|| filename.to_string())
}
