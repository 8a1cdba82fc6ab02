//! HTML export and import as editor commands

use futures::future::FutureExt;
use luthor_codec::{DocumentCodec, ImportOptions};
use luthor_document::DocumentHandle;
use luthor_runtime::{
    parse_args, Category, Cleanup, CommandDef, CommandError, Extension, ExtensionContext, Outcome,
    StateQuery,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImportArgs {
    #[serde(alias = "html", alias = "markdown")]
    pub content: String,
    #[serde(default)]
    pub prevent_focus: bool,
}

impl ImportArgs {
    /// Accepts `{content, preventFocus}` or the bare text
    pub(crate) fn parse(command: &str, args: Value) -> Result<Self, CommandError> {
        match args {
            Value::String(content) => Ok(Self {
                content,
                prevent_focus: false,
            }),
            args => parse_args(command, args),
        }
    }

    pub(crate) fn options(&self) -> ImportOptions {
        ImportOptions {
            prevent_focus: self.prevent_focus,
        }
    }
}

#[derive(Debug, Default)]
pub struct HtmlExtension;

impl Extension for HtmlExtension {
    fn id(&self) -> &str {
        "html"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Structural]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        // Node types are final by the time commands are collected, so the
        // registry snapshot covers every codec in the composition.
        let codec = DocumentCodec::new(ctx.document.clone(), ctx.block_registry());

        let exporter = codec.clone();
        let export = CommandDef::new("exportToHTML", move |_| {
            let html = exporter
                .export_to_html()
                .map_err(|e| CommandError::failed("exportToHTML", e.to_string()))?;
            Ok(Outcome::value(html))
        })
        .fallback(json!(""));

        let import = CommandDef::new("importFromHTML", move |args| {
            let args = ImportArgs::parse("importFromHTML", args)?;
            let codec = codec.clone();
            Ok(Outcome::Pending(
                async move {
                    let outcome = codec.import_from_html(&args.content, args.options()).await;
                    Ok(json!(outcome))
                }
                .boxed(),
            ))
        });

        vec![export, import]
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("canExportHTML", |state| json!(!state.tree.is_empty()))]
    }
}
