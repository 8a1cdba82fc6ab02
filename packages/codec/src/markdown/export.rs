//! Tree to Markdown

use luthor_document::{Block, ListType, Tree};
use luthor_runtime::{BlockDirective, BlockRegistry};

use crate::markdown::inline::{self, longest_run};
use crate::markdown::{DIRECTIVE_PREFIX, DIRECTIVE_SUFFIX};

pub fn export(tree: &Tree, registry: &BlockRegistry) -> String {
    tree.children
        .iter()
        .filter_map(|block| export_block(block, registry))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn export_block(block: &Block, registry: &BlockRegistry) -> Option<String> {
    match block {
        Block::Paragraph { children, .. } => {
            let text = inline::render(children);
            (!text.trim().is_empty()).then_some(text)
        }
        Block::Heading { level, children, .. } => Some(format!(
            "{} {}",
            "#".repeat(usize::from(*level)),
            inline::render_single_line(children)
        )),
        Block::Quote { children, .. } => {
            let text = inline::render(children);
            let quoted = text
                .split('\n')
                .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                .collect::<Vec<_>>()
                .join("\n");
            Some(quoted)
        }
        Block::List {
            list_type, items, ..
        } => {
            if items.is_empty() {
                return None;
            }
            let lines: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let text = inline::render_single_line(&item.children);
                    match list_type {
                        ListType::Bullet => format!("- {}", text),
                        ListType::Number => format!("{}. {}", index + 1, text),
                        ListType::Check => {
                            let mark = if item.checked.unwrap_or(false) { 'x' } else { ' ' };
                            format!("- [{}] {}", mark, text)
                        }
                    }
                })
                .collect();
            Some(lines.join("\n"))
        }
        Block::Code { language, text, .. } => {
            let fence = "`".repeat(longest_run(text, '`').max(2) + 1);
            Some(format!(
                "{}{}\n{}\n{}",
                fence,
                language.as_deref().unwrap_or(""),
                text,
                fence
            ))
        }
        Block::Table { rows, .. } => {
            let header = rows.first()?;
            let columns = header.cells.len().max(1);
            let mut lines = Vec::with_capacity(rows.len() + 1);
            for (index, row) in rows.iter().enumerate() {
                let mut cells: Vec<String> = row
                    .cells
                    .iter()
                    .map(|cell| inline::render_cell(&cell.children))
                    .collect();
                // Short rows are padded to the header width
                cells.resize(cells.len().max(columns), String::new());
                lines.push(format!("| {} |", cells.join(" | ")));
                if index == 0 {
                    lines.push(format!("| {} |", vec!["---"; cells.len()].join(" | ")));
                }
            }
            Some(lines.join("\n"))
        }
        Block::HorizontalRule { .. } => Some("---".to_string()),
        Block::Custom { node_type, .. } => match registry.serialize_block(block) {
            Some((directive, placeholder)) => Some(render_directive(&directive, &placeholder)),
            None => {
                tracing::warn!(node_type = %node_type, "no block codec registered, omitting from markdown");
                None
            }
        },
    }
}

/// Directive comment followed by exactly one placeholder line
fn render_directive(directive: &BlockDirective, placeholder: &str) -> String {
    // `>` never appears raw, so the JSON cannot close the comment early
    let json = serde_json::to_string(directive)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('>', "\\u003e");
    let placeholder = placeholder.split_whitespace().collect::<Vec<_>>().join(" ");
    let placeholder = if placeholder.is_empty() {
        format!("[{}]", directive.node_type)
    } else {
        placeholder
    };
    format!("{}{}{}\n{}", DIRECTIVE_PREFIX, json, DIRECTIVE_SUFFIX, placeholder)
}
