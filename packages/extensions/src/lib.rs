//! # Luthor Extensions
//!
//! First-party extensions for the Luthor runtime. Each module owns one
//! editing concern: its node types, commands, state queries and toolbar
//! contributions. [`presets`] bundles them into ready-made compositions.
//!
//! ```ignore
//! use luthor_extensions::presets;
//! use luthor_runtime::Composition;
//!
//! let composition = Composition::builder()
//!     .extensions(presets::extensive())
//!     .build()?;
//! composition.execute("toggleBold", serde_json::Value::Null)?;
//! ```

pub mod block_format;
pub mod code;
pub mod code_intelligence;
pub mod history;
pub mod horizontal_rule;
pub mod html;
pub mod link;
pub mod list;
pub mod markdown;
pub mod media;
pub mod presets;
pub mod rich_text;
mod support;
pub mod table;
pub mod text_format;

pub use block_format::{BlockFormatExtension, BlockKind};
pub use code::CodeExtension;
pub use code_intelligence::{CodeIntelligenceConfig, CodeIntelligenceExtension, HighlightProvider};
pub use history::HistoryExtension;
pub use horizontal_rule::HorizontalRuleExtension;
pub use html::HtmlExtension;
pub use link::{LinkConfig, LinkExtension};
pub use list::ListExtension;
pub use markdown::MarkdownExtension;
pub use media::MediaExtension;
pub use rich_text::RichTextExtension;
pub use table::{TableConfig, TableExtension};
pub use text_format::TextFormatExtension;
