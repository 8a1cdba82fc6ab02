//! Rich text: paragraphs, text runs and line breaks, plus plain text entry

use luthor_document::{
    Block, DocumentHandle, Inline, Mutation, MutationError, NodeKey, NodeRef, Selection, Tree,
    UpdateContext,
};
use luthor_runtime::{
    parse_args, Category, Cleanup, CommandDef, Extension, ExtensionContext, NodeTypeSpec, Outcome,
    StateQuery,
};
use serde::Deserialize;
use serde_json::json;

use crate::support::{insertion_index, isolate_and_reselect};

#[derive(Debug, Default)]
pub struct RichTextExtension;

#[derive(Deserialize)]
struct InsertTextArgs {
    text: String,
}

impl Extension for RichTextExtension {
    fn id(&self) -> &str {
        "richText"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Structural]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![
            NodeTypeSpec::new("paragraph"),
            NodeTypeSpec::new("text"),
            NodeTypeSpec::new("line-break"),
        ]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let insert_text = CommandDef::new("insertText", move |args| {
            let args: InsertTextArgs = parse_args("insertText", args)?;
            let inserted = document.update("insert-text", |ctx| insert_text(ctx, &args.text))?;
            Ok(Outcome::value(inserted.is_some()))
        })
        .fallback(json!(false));

        let document = ctx.document.clone();
        let insert_paragraph = CommandDef::new("insertParagraph", move |_| {
            let key = document.update("insert-paragraph", |ctx| {
                let index = insertion_index(ctx.state());
                let block = ctx.factory().paragraph(Vec::new());
                let key = block.key().to_string();
                ctx.apply(Mutation::InsertBlock { index, block })?;
                ctx.set_selection(Some(Selection::collapsed(key.clone(), 0)));
                Ok(key)
            })?;
            Ok(Outcome::value(key))
        });

        vec![insert_text, insert_paragraph]
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("isEmpty", |state| {
            json!(state.tree.text_content().trim().is_empty()
                && state.tree.children.iter().all(|block| matches!(block, Block::Paragraph { .. })))
        })]
    }
}

/// Text inserted by [`insert_text`]: the node holding it and its character span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedText {
    pub key: NodeKey,
    pub start: usize,
    pub end: usize,
}

/// Replace the selection with `text`, leaving the caret after it.
///
/// A range selection keeps its first covered node and drops the rest. A
/// caret inside a block with no text node starts a new run.
pub fn insert_text(ctx: &mut UpdateContext<'_>, text: &str) -> Result<Option<InsertedText>, MutationError> {
    let Some(selection) = ctx.selection().cloned() else {
        return Ok(None);
    };
    let length = text.chars().count();

    if !selection.is_collapsed() {
        let covered = isolate_and_reselect(ctx);
        if let Some((first, rest)) = covered.split_first() {
            ctx.apply(Mutation::UpdateText {
                node_id: first.clone(),
                content: text.to_string(),
            })?;
            for key in rest {
                ctx.apply(Mutation::RemoveNode { node_id: key.clone() })?;
            }
            ctx.set_selection(Some(Selection::collapsed(first.clone(), length)));
            return Ok(Some(InsertedText {
                key: first.clone(),
                start: 0,
                end: length,
            }));
        }
    }

    let point = selection.focus;
    let existing = match ctx.tree().find(&point.key) {
        Some(NodeRef::Inline(Inline::Text { text, .. })) => Some(text.clone()),
        Some(NodeRef::Block(Block::Code { text, .. })) => Some(text.clone()),
        _ => None,
    };

    let inserted = match existing {
        Some(current) => {
            let offset = point.offset.min(current.chars().count());
            let byte = current
                .char_indices()
                .nth(offset)
                .map_or(current.len(), |(byte, _)| byte);
            let mut content = current;
            content.insert_str(byte, text);
            ctx.apply(Mutation::UpdateText {
                node_id: point.key.clone(),
                content,
            })?;
            InsertedText {
                key: point.key.clone(),
                start: offset,
                end: offset + length,
            }
        }
        None => {
            let run = ctx.factory().text(text);
            let key = run.key().to_string();
            let container = inline_container_mut(ctx.tree_mut(), &point.key)
                .ok_or_else(|| MutationError::InvalidStructure(format!("cannot insert text into {}", point.key)))?;
            container.push(run);
            InsertedText {
                key,
                start: 0,
                end: length,
            }
        }
    };

    ctx.set_selection(Some(Selection::collapsed(inserted.key.clone(), inserted.end)));
    Ok(Some(inserted))
}

/// Inline children of a text-bearing block, list item or table cell
pub(crate) fn inline_container_mut<'a>(tree: &'a mut Tree, key: &str) -> Option<&'a mut Vec<Inline>> {
    let index = tree.block_index(key)?;
    match &mut tree.children[index] {
        Block::List { items, .. } => items
            .iter_mut()
            .find(|item| item.key == key)
            .map(|item| &mut item.children),
        Block::Table { rows, .. } => rows
            .iter_mut()
            .flat_map(|row| row.cells.iter_mut())
            .find(|cell| cell.key == key)
            .map(|cell| &mut cell.children),
        block if block.key() == key => block.inlines_mut(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Point};

    #[test]
    fn test_insert_into_empty_paragraph() {
        let document = DocumentHandle::new(Document::new("rich"));
        let key = document.read(|state| state.tree.children[0].key().to_string());
        document.set_selection(Some(Selection::collapsed(key, 0)));

        let inserted = document
            .update("t", |ctx| insert_text(ctx, "Hello"))
            .unwrap()
            .unwrap();

        let state = document.state();
        assert_eq!(state.tree.text_content(), "Hello");
        assert_eq!(state.selection, Some(Selection::collapsed(inserted.key, 5)));
    }

    #[test]
    fn test_insert_at_caret_and_over_range() {
        let document = DocumentHandle::new(Document::new("rich"));
        let key = document
            .update("t", |ctx| {
                let block = ctx.factory().paragraph_text("Hello world");
                let key = ctx.tree().children[0].key().to_string();
                ctx.apply(Mutation::ReplaceBlock { node_id: key, block })?;
                Ok(ctx.tree().text_keys()[0].clone())
            })
            .unwrap();

        document.set_selection(Some(Selection::collapsed(key.clone(), 5)));
        document.update("t", |ctx| insert_text(ctx, ",")).unwrap();
        assert_eq!(document.state().tree.text_content(), "Hello, world");

        document.set_selection(Some(Selection::range(Point::new(key.clone(), 7), Point::new(key, 12))));
        document.update("t", |ctx| insert_text(ctx, "there")).unwrap();
        assert_eq!(document.state().tree.text_content(), "Hello, there");
    }
}
