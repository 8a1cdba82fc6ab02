//! Horizontal rules

use luthor_document::{DocumentError, DocumentHandle, Mutation, Selection};
use luthor_runtime::{
    Category, Cleanup, CommandDef, Extension, ExtensionContext, NodeTypeSpec, Outcome, UiContribution,
};
use serde_json::Value;

use crate::support::{insertion_index, start_of_block};

/// Insert a rule after the anchor block, followed by an empty paragraph for
/// the caret when the rule would otherwise end the document
pub fn insert_horizontal_rule(document: &DocumentHandle) -> Result<String, DocumentError> {
    document.update("horizontal-rule", |ctx| {
        let index = insertion_index(ctx.state());
        let rule = ctx.factory().horizontal_rule();
        let key = rule.key().to_string();
        ctx.apply(Mutation::InsertBlock { index, block: rule })?;

        let caret = match ctx.tree().children.get(index + 1) {
            Some(next) => start_of_block(next),
            None => {
                let paragraph = ctx.factory().paragraph(Vec::new());
                let selection = Selection::collapsed(paragraph.key().to_string(), 0);
                ctx.apply(Mutation::InsertBlock {
                    index: index + 1,
                    block: paragraph,
                })?;
                selection
            }
        };
        ctx.set_selection(Some(caret));
        Ok(key)
    })
}

#[derive(Debug, Default)]
pub struct HorizontalRuleExtension;

impl Extension for HorizontalRuleExtension {
    fn id(&self) -> &str {
        "horizontalRule"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("horizontal-rule")]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        vec![CommandDef::new("insertHorizontalRule", move |_| {
            Ok(Outcome::value(insert_horizontal_rule(&document)?))
        })
        .feature("horizontalRule")
        .formatting()
        .fallback(Value::Null)]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![UiContribution::new("horizontalRule", Category::Toolbar, "Divider").command("insertHorizontalRule")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Block, Document};

    #[test]
    fn test_rule_at_end_adds_trailing_paragraph() {
        let document = DocumentHandle::new(Document::new("rules"));
        let first = document.read(|state| state.tree.children[0].key().to_string());
        document.set_selection(Some(Selection::collapsed(first, 0)));

        insert_horizontal_rule(&document).unwrap();

        document.read(|state| {
            assert_eq!(state.tree.children.len(), 3);
            assert!(matches!(state.tree.children[1], Block::HorizontalRule { .. }));
            let caret = state.selection.as_ref().unwrap();
            assert_eq!(caret.anchor.key, state.tree.children[2].key());
        });
    }
}
