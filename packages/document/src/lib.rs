//! # Luthor Document
//!
//! Document model shared by the editor runtime, codecs and extensions.
//!
//! ```text
//! ┌────────────────┐  update(tag, f)  ┌──────────────┐
//! │ DocumentHandle │ ───────────────▶ │   Document   │
//! └────────────────┘                  │  state: Arc  │──▶ listeners
//!                                     │  history     │
//!                                     └──────────────┘
//! ```

pub mod document;
pub mod errors;
pub mod handle;
pub mod history;
pub mod keys;
pub mod mutations;
pub mod node;
mod notify;
pub mod selection;
pub mod visitor;

pub use document::{tags, ChangeEvent, Document, EditorState, Listener, ListenerId, UpdateContext};
pub use errors::DocumentError;
pub use handle::{DocumentGuard, DocumentHandle};
pub use history::History;
pub use keys::{get_document_seed, IdGenerator, NodeFactory};
pub use mutations::{Mutation, MutationError};
pub use node::{
    inline_text, Alignment, Block, Inline, ListItem, ListType, NodeKey, NodeRef, TableCell,
    TableRow, TextFormat, Tree,
};
pub use selection::{Point, Selection};
pub use visitor::{Visitor, VisitorMut};
