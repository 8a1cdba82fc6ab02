//! Hypertext channel: tokenizer, DOM builder and the block transform

pub mod dom;
pub mod lexer;
pub mod transform;
pub mod writer;

pub use transform::{HtmlTransform, MarkupTransform};
pub use writer::{escape_html, WriteOptions};
