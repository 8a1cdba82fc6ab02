//! # Document Codec
//!
//! Converts the live document to and from text. Both import paths commit
//! as one `import` update, so listeners see a single change.
//!
//! ```text
//! import_from_html
//!   ├─ envelope present, hash matches ──▶ restore snapshot (keys kept)
//!   ├─ hash mismatch / bad envelope  ──▶ transform import (fresh keys)
//!   └─ transform import fails        ──▶ one empty paragraph
//! ```

use luthor_document::{tags, Block, DocumentHandle, EditorState, Inline, Selection, Tree};
use luthor_runtime::{BlockRegistry, Composition};
use serde::Serialize;
use std::sync::Arc;

use crate::envelope;
use crate::error::CodecError;
use crate::html::{HtmlTransform, MarkupTransform};
use crate::markdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Leave the selection cleared instead of placing it at the start
    pub prevent_focus: bool,
}

/// Which import branch produced the committed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportOutcome {
    Snapshot,
    Reparsed,
    Reset,
}

#[derive(Clone)]
pub struct DocumentCodec {
    document: DocumentHandle,
    registry: BlockRegistry,
    transform: Arc<dyn MarkupTransform>,
}

impl std::fmt::Debug for DocumentCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCodec")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl DocumentCodec {
    pub fn new(document: DocumentHandle, registry: BlockRegistry) -> Self {
        Self {
            document,
            registry,
            transform: Arc::new(HtmlTransform::default()),
        }
    }

    /// Codec over a composition's document and node-type codecs
    pub fn for_composition(composition: &Composition) -> Self {
        Self::new(composition.document().clone(), composition.block_registry())
    }

    pub fn with_transform(mut self, transform: impl MarkupTransform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    /// Markup followed by the state envelope. Markup and snapshot come from
    /// the same committed state.
    pub fn export_to_html(&self) -> Result<String, CodecError> {
        let state = self.document.state();
        let html = self.transform.export(&state.tree, &self.registry);
        envelope::append(&html, state.to_json())
    }

    /// Replace the document with imported markup. Never fails: problems are
    /// logged and the document is reset to one empty paragraph at worst.
    pub async fn import_from_html(&self, html: &str, options: ImportOptions) -> ImportOutcome {
        let (body, envelope) = envelope::extract(html);
        match envelope {
            Some(Ok(envelope)) if envelope.matches(body) => {
                match EditorState::from_json(&envelope.editor_state) {
                    Ok(state) => match self.commit(state.tree, false, options) {
                        Ok(()) => return ImportOutcome::Snapshot,
                        Err(e) => tracing::warn!(error = %e, "restoring embedded snapshot failed, reparsing markup"),
                    },
                    Err(e) => tracing::warn!(error = %e, "embedded snapshot unreadable, reparsing markup"),
                }
            }
            Some(Ok(_)) => tracing::debug!("markup changed since export, reparsing"),
            Some(Err(e)) => tracing::warn!(error = %e, "malformed state envelope, reparsing markup"),
            None => {}
        }

        match self.transform.import(body, &self.registry).await {
            Ok(tree) => match self.commit(tree, true, options) {
                Ok(()) => ImportOutcome::Reparsed,
                Err(e) => {
                    tracing::error!(error = %e, "committing imported markup failed, resetting document");
                    self.reset(options)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "markup import failed, resetting document");
                self.reset(options)
            }
        }
    }

    pub fn export_to_markdown(&self) -> String {
        let state = self.document.state();
        markdown::export(&state.tree, &self.registry)
    }

    pub fn import_from_markdown(&self, text: &str, options: ImportOptions) -> ImportOutcome {
        let tree = markdown::import(text, &self.registry);
        match self.commit(tree, true, options) {
            Ok(()) => ImportOutcome::Reparsed,
            Err(e) => {
                tracing::error!(error = %e, "committing imported markdown failed, resetting document");
                self.reset(options)
            }
        }
    }

    fn reset(&self, options: ImportOptions) -> ImportOutcome {
        let tree = Tree::new(Vec::new());
        if let Err(e) = self.commit(tree, true, options) {
            tracing::error!(error = %e, "resetting document failed");
        }
        ImportOutcome::Reset
    }

    fn commit(&self, mut tree: Tree, rekey: bool, options: ImportOptions) -> Result<(), CodecError> {
        self.document.update(tags::IMPORT, |ctx| {
            if rekey {
                tree.rekey(ctx.ids());
            }
            if tree.children.is_empty() {
                let paragraph = ctx.factory().paragraph(Vec::new());
                tree.children.push(paragraph);
            }
            ctx.replace_tree(tree);
            if !options.prevent_focus {
                let start = start_of(ctx.tree());
                ctx.set_selection(start);
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Collapsed selection at the first text position
fn start_of(tree: &Tree) -> Option<Selection> {
    let block = tree.children.first()?;
    let first_text = block.inlines().and_then(|inlines| {
        inlines.iter().find_map(|inline| match inline {
            Inline::Text { key, .. } => Some(key.clone()),
            _ => None,
        })
    });
    let key = match (first_text, block) {
        (Some(key), _) => key,
        (None, Block::List { items, .. }) => items.first().map_or_else(|| block.key().to_string(), |item| item.key.clone()),
        (None, _) => block.key().to_string(),
    };
    Some(Selection::collapsed(key, 0))
}
