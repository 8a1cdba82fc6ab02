//! Inline text formats

use luthor_document::{DocumentError, DocumentHandle, Mutation, TextFormat};
use luthor_runtime::{
    Category, Cleanup, CommandDef, Extension, ExtensionContext, Outcome, StateQuery,
    UiContribution,
};
use serde_json::json;

use crate::support::{has_format, has_range_selection, isolate_and_reselect, text_at};

/// (command suffix, format, feature flag)
const FORMATS: &[(&str, TextFormat, &str)] = &[
    ("Bold", TextFormat::BOLD, "bold"),
    ("Italic", TextFormat::ITALIC, "italic"),
    ("Underline", TextFormat::UNDERLINE, "underline"),
    ("Strikethrough", TextFormat::STRIKETHROUGH, "strikethrough"),
    ("Code", TextFormat::CODE, "codeFormat"),
    ("Subscript", TextFormat::SUBSCRIPT, "subscript"),
    ("Superscript", TextFormat::SUPERSCRIPT, "superscript"),
];

#[derive(Debug, Default)]
pub struct TextFormatExtension;

impl Extension for TextFormatExtension {
    fn id(&self) -> &str {
        "textFormat"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar, Category::Floating]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        FORMATS
            .iter()
            .map(|&(suffix, format, feature)| {
                let document = ctx.document.clone();
                CommandDef::new(format!("toggle{}", suffix), move |_| {
                    Ok(Outcome::value(toggle_format(&document, format)?))
                })
                .feature(feature)
                .formatting()
                .fallback(json!(false))
            })
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        FORMATS
            .iter()
            .map(|&(suffix, format, _)| {
                StateQuery::sync(format!("is{}", suffix), move |state| json!(has_format(state, format)))
            })
            .collect()
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        FORMATS
            .iter()
            .map(|(suffix, _, _)| {
                UiContribution::new(suffix.to_lowercase(), Category::Toolbar, *suffix)
                    .command(format!("toggle{}", suffix))
            })
            .collect()
    }
}

/// Toggle a format over the selected text.
///
/// The format is removed when every covered node already has it and added
/// everywhere otherwise. Subscript and superscript exclude each other. A
/// collapsed selection changes nothing.
pub fn toggle_format(document: &DocumentHandle, format: TextFormat) -> Result<bool, DocumentError> {
    if !document.read(has_range_selection) {
        return Ok(false);
    }

    document.update("format", |ctx| {
        let keys = isolate_and_reselect(ctx);
        if keys.is_empty() {
            return Ok(false);
        }

        let formats: Vec<TextFormat> = keys
            .iter()
            .filter_map(|key| text_at(ctx.tree(), key).map(|(_, format)| format))
            .collect();
        let remove = formats.iter().all(|current| current.contains(format));

        for (key, mut current) in keys.iter().zip(formats) {
            if remove {
                current.remove(format);
            } else {
                current.insert(format);
                if format == TextFormat::SUBSCRIPT {
                    current.remove(TextFormat::SUPERSCRIPT);
                } else if format == TextFormat::SUPERSCRIPT {
                    current.remove(TextFormat::SUBSCRIPT);
                }
            }
            ctx.apply(Mutation::SetTextFormat {
                node_id: key.clone(),
                format: current,
            })?;
        }
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Inline, Point, Selection};

    fn document_with(text: &str) -> (DocumentHandle, String) {
        let document = DocumentHandle::new(Document::new("format"));
        let key = document
            .update("setup", |ctx| {
                let block = ctx.factory().paragraph_text(text);
                let old = ctx.tree().children[0].key().to_string();
                ctx.apply(Mutation::ReplaceBlock { node_id: old, block })?;
                Ok(ctx.tree().text_keys()[0].clone())
            })
            .unwrap();
        (document, key)
    }

    fn runs(document: &DocumentHandle) -> Vec<(String, TextFormat)> {
        let state = document.state();
        state.tree.children[0]
            .inlines()
            .unwrap()
            .iter()
            .filter_map(|inline| match inline {
                Inline::Text { text, format, .. } => Some((text.clone(), *format)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_toggle_splits_and_restores() {
        let (document, key) = document_with("Hello world");
        document.set_selection(Some(Selection::range(Point::new(key.clone(), 6), Point::new(key, 11))));

        assert!(toggle_format(&document, TextFormat::BOLD).unwrap());
        assert_eq!(
            runs(&document),
            vec![("Hello ".to_string(), TextFormat::empty()), ("world".to_string(), TextFormat::BOLD)]
        );
        assert!(document.read(|state| has_format(state, TextFormat::BOLD)));

        assert!(toggle_format(&document, TextFormat::BOLD).unwrap());
        assert!(runs(&document).iter().all(|(_, format)| format.is_empty()));
    }

    #[test]
    fn test_subscript_clears_superscript() {
        let (document, key) = document_with("x2");
        document.set_selection(Some(Selection::range(Point::new(key.clone(), 0), Point::new(key, 2))));

        toggle_format(&document, TextFormat::SUPERSCRIPT).unwrap();
        toggle_format(&document, TextFormat::SUBSCRIPT).unwrap();

        assert_eq!(runs(&document), vec![("x2".to_string(), TextFormat::SUBSCRIPT)]);
    }

    #[test]
    fn test_collapsed_selection_is_noop() {
        let (document, key) = document_with("abc");
        document.set_selection(Some(Selection::collapsed(key, 1)));
        let version = document.version();
        assert!(!toggle_format(&document, TextFormat::ITALIC).unwrap());
        assert_eq!(document.version(), version);
    }
}
