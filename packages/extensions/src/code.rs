//! Code blocks. The `code` node type is a restricted region: formatting
//! commands are suppressed while the selection sits inside one.

use luthor_document::{Block, DocumentError, DocumentHandle, EditorState, Inline, Mutation, Selection};
use luthor_runtime::{
    Category, Cleanup, CommandDef, Extension, ExtensionContext, NodeTypeSpec, Outcome, StateQuery,
};
use serde_json::json;

use crate::block_format::BlockKind;
use crate::support::{selected_range, start_of_block};

#[derive(Debug, Default)]
pub struct CodeExtension;

pub fn is_in_code_block(state: &EditorState) -> bool {
    matches!(state.anchor_block(), Some(Block::Code { .. }))
}

/// Turn the selected text blocks into one code block, or a code block back
/// into paragraphs, one per line
pub fn toggle_code_block(document: &DocumentHandle) -> Result<bool, DocumentError> {
    document.update("code-block", |ctx| {
        let Some(range) = selected_range(ctx.state()) else {
            return Ok(false);
        };
        let (start, end) = (*range.start(), *range.end());

        if let Block::Code { text, .. } = &ctx.tree().children[start] {
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            let lines = if lines.is_empty() { vec![String::new()] } else { lines };
            let paragraphs: Vec<Block> = {
                let mut factory = ctx.factory();
                lines.iter().map(|line| factory.paragraph_text(line)).collect()
            };
            let selection = start_of_block(&paragraphs[0]);
            ctx.tree_mut().children.splice(start..=start, paragraphs);
            ctx.set_selection(Some(selection));
            return Ok(true);
        }

        let selected: Vec<&Block> = ctx.tree().children[start..=end]
            .iter()
            .filter(|block| BlockKind::of(block).is_some())
            .collect();
        let Some(first) = selected.first() else {
            return Ok(false);
        };
        let key = first.key().to_string();
        let text = selected
            .iter()
            .map(|block| block_text(block))
            .collect::<Vec<_>>()
            .join("\n");
        let removed: Vec<String> = selected[1..].iter().map(|block| block.key().to_string()).collect();

        ctx.apply(Mutation::ReplaceBlock {
            node_id: key.clone(),
            block: Block::Code {
                key: key.clone(),
                language: None,
                theme: None,
                text,
            },
        })?;
        for node_id in removed {
            ctx.apply(Mutation::RemoveNode { node_id })?;
        }
        ctx.set_selection(Some(Selection::collapsed(key, 0)));
        Ok(true)
    })
}

/// Block text with line breaks kept as newlines
fn block_text(block: &Block) -> String {
    block
        .inlines()
        .map(|inlines| inlines.iter().map(Inline::text_content).collect())
        .unwrap_or_default()
}

impl Extension for CodeExtension {
    fn id(&self) -> &str {
        "code"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("code").restricted()]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        vec![CommandDef::new("toggleCodeBlock", move |_| {
            Ok(Outcome::value(toggle_code_block(&document)?))
        })
        .feature("code")
        .fallback(json!(false))]
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("isInCodeBlock", |state| json!(is_in_code_block(state)))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Point, Tree};

    #[test]
    fn test_paragraphs_join_into_code_and_split_back() {
        let mut document = Document::new("code");
        let tree = {
            let mut factory = document.ids_mut().factory();
            Tree::new(vec![factory.paragraph_text("let a = 1;"), factory.paragraph_text("let b = 2;")])
        };
        document
            .update("setup", |ctx| {
                ctx.replace_tree(tree);
                Ok(())
            })
            .unwrap();
        let document = DocumentHandle::new(document);
        let keys = document.read(|state| state.tree.text_keys());
        document.set_selection(Some(Selection::range(
            Point::new(keys[0].clone(), 0),
            Point::new(keys[1].clone(), 3),
        )));

        toggle_code_block(&document).unwrap();
        document.read(|state| {
            assert_eq!(state.tree.children.len(), 1);
            assert!(matches!(&state.tree.children[0], Block::Code { text, .. } if text == "let a = 1;\nlet b = 2;"));
            assert!(is_in_code_block(state));
        });

        toggle_code_block(&document).unwrap();
        document.read(|state| {
            assert_eq!(state.tree.children.len(), 2);
            assert!(!is_in_code_block(state));
            assert_eq!(state.tree.text_content(), "let a = 1;\nlet b = 2;");
        });
    }
}
