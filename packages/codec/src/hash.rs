//! Content hash guarding the embedded state snapshot.
//!
//! The hash covers the exported markup with every whitespace run collapsed
//! to a single space and the ends trimmed, so reformatting survives but any
//! change to visible text or structure does not.

use crc32fast::Hasher;

pub fn normalize_markup(html: &str) -> String {
    html.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-case 8-digit hex CRC32 of the normalized markup
pub fn content_hash(html: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(normalize_markup(html).as_bytes());
    format!("{:08x}", hasher.finalize())
}
