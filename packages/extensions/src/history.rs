//! Undo and redo over the document's history stack

use luthor_document::DocumentHandle;
use luthor_runtime::{
    Category, Cleanup, CommandDef, Extension, ExtensionContext, Outcome, StateQuery, UiContribution,
};
use serde_json::json;

#[derive(Debug, Default)]
pub struct HistoryExtension;

impl Extension for HistoryExtension {
    fn id(&self) -> &str {
        "history"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let undo = CommandDef::new("undo", move |_| Ok(Outcome::value(document.lock().undo())));
        let document = ctx.document.clone();
        let redo = CommandDef::new("redo", move |_| Ok(Outcome::value(document.lock().redo())));

        [undo, redo]
            .into_iter()
            .map(|command| command.feature("history").fallback(json!(false)))
            .collect()
    }

    fn state_queries(&self, ctx: &ExtensionContext) -> Vec<StateQuery> {
        let document = ctx.document.clone();
        let can_undo = StateQuery::sync("canUndo", move |_| json!(document.lock().history().can_undo()));
        let document = ctx.document.clone();
        let can_redo = StateQuery::sync("canRedo", move |_| json!(document.lock().history().can_redo()));
        vec![can_undo, can_redo]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![
            UiContribution::new("undo", Category::Toolbar, "Undo").command("undo"),
            UiContribution::new("redo", Category::Toolbar, "Redo").command("redo"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Mutation};
    use serde_json::Value;

    #[test]
    fn test_undo_redo_round() {
        let document = DocumentHandle::new(Document::new("history"));
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Default::default(),
        };
        let commands = HistoryExtension.commands(&ctx);
        let run = |name: &str| match commands.iter().find(|c| c.name == name).unwrap().invoke(Value::Null) {
            Ok(Outcome::Ready(value)) => value,
            _ => panic!("{} failed", name),
        };

        assert_eq!(run("undo"), json!(false));
        document
            .update("edit", |ctx| {
                let block = ctx.factory().horizontal_rule();
                ctx.apply(Mutation::InsertBlock { index: 0, block })
            })
            .unwrap();

        assert_eq!(run("undo"), json!(true));
        assert_eq!(document.read(|state| state.tree.children.len()), 1);
        assert_eq!(run("redo"), json!(true));
        assert_eq!(document.read(|state| state.tree.children.len()), 2);
    }
}
