//! # Luthor Codec
//!
//! Converts documents to portable text and back.
//!
//! - Hypertext: deterministic markup plus a trailing comment holding a
//!   hash-guarded snapshot, so unchanged markup restores losslessly and
//!   edited markup is reparsed.
//! - Markdown: conventional syntax, with extension-owned blocks written as
//!   directive comments whose payload the block registry rebuilds.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod html;
pub mod markdown;

pub use codec::{DocumentCodec, ImportOptions, ImportOutcome};
pub use envelope::{Envelope, ENVELOPE_PREFIX, ENVELOPE_VERSION};
pub use error::CodecError;
pub use hash::content_hash;
pub use html::{HtmlTransform, MarkupTransform, WriteOptions};
