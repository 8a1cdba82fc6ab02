//! Markdown export and import as editor commands

use luthor_codec::DocumentCodec;
use luthor_document::DocumentHandle;
use luthor_runtime::{Category, Cleanup, CommandDef, Extension, ExtensionContext, Outcome, StateQuery};
use serde_json::json;

use crate::html::ImportArgs;

#[derive(Debug, Default)]
pub struct MarkdownExtension;

impl Extension for MarkdownExtension {
    fn id(&self) -> &str {
        "markdown"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Structural]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let codec = DocumentCodec::new(ctx.document.clone(), ctx.block_registry());

        let exporter = codec.clone();
        let export = CommandDef::new("exportToMarkdown", move |_| {
            Ok(Outcome::value(exporter.export_to_markdown()))
        })
        .fallback(json!(""));

        let import = CommandDef::new("importFromMarkdown", move |args| {
            let args = ImportArgs::parse("importFromMarkdown", args)?;
            let outcome = codec.import_from_markdown(&args.content, args.options());
            Ok(Outcome::value(json!(outcome)))
        });

        vec![export, import]
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("canExportMarkdown", |state| json!(!state.tree.is_empty()))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Block, Document};
    use serde_json::Value;

    #[test]
    fn test_markdown_commands_round_trip_headings() {
        let document = DocumentHandle::new(Document::new("md"));
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Default::default(),
        };
        let commands = MarkdownExtension.commands(&ctx);
        let run = |name: &str, args: Value| match commands.iter().find(|c| c.name == name).unwrap().invoke(args) {
            Ok(Outcome::Ready(value)) => value,
            _ => panic!("{} failed", name),
        };

        run("importFromMarkdown", json!("# Title\n\nBody text"));
        document.read(|state| {
            assert!(matches!(state.tree.children[0], Block::Heading { level: 1, .. }));
        });
        let exported = run("exportToMarkdown", Value::Null);
        assert!(exported.as_str().unwrap().starts_with("# Title"));
    }
}
