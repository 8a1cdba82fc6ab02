//! Ready-made extension sets

use luthor_runtime::Extension;

use crate::{
    BlockFormatExtension, CodeExtension, CodeIntelligenceExtension, HistoryExtension,
    HorizontalRuleExtension, HtmlExtension, LinkExtension, ListExtension, MarkdownExtension,
    MediaExtension, RichTextExtension, TableExtension, TextFormatExtension,
};

/// Every first-party extension, in registration order
pub fn extensive() -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(RichTextExtension),
        Box::new(TextFormatExtension),
        Box::new(BlockFormatExtension),
        Box::new(ListExtension),
        Box::new(CodeExtension),
        Box::new(CodeIntelligenceExtension::new()),
        Box::new(TableExtension::default()),
        Box::new(LinkExtension::default()),
        Box::new(MediaExtension),
        Box::new(HorizontalRuleExtension),
        Box::new(HistoryExtension),
        Box::new(HtmlExtension),
        Box::new(MarkdownExtension),
    ]
}

/// Plain paragraphs with inline formatting and undo
pub fn simple_text() -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(RichTextExtension),
        Box::new(TextFormatExtension),
        Box::new(HistoryExtension),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_preset_ids_are_unique() {
        let extensions = extensive();
        let ids: HashSet<&str> = extensions.iter().map(|e| e.id()).collect();
        assert_eq!(ids.len(), extensions.len());
        assert!(ids.contains("codeIntelligence"));

        let simple: Vec<String> = simple_text().iter().map(|e| e.id().to_string()).collect();
        assert_eq!(simple, vec!["richText", "textFormat", "history"]);
    }
}
