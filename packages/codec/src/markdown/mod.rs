//! Lightweight-markup channel
//!
//! Standard blocks use conventional Markdown. Extension-owned blocks are
//! written as a directive comment plus one placeholder line:
//!
//! ```text
//! <!-- LUTHOR_BLOCK {"type":"embed","payload":{"url":"https://x"}} -->
//! **[Embed: https://x]**
//! ```

pub mod export;
pub mod import;
pub mod inline;

pub const DIRECTIVE_PREFIX: &str = "<!-- LUTHOR_BLOCK ";
pub const DIRECTIVE_SUFFIX: &str = " -->";

pub use export::export;
pub use import::{import, parse_directive};
