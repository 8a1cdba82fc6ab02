//! Markdown to tree
//!
//! A line scanner. Each step recognizes one construct starting at the
//! current line and returns how many lines it consumed.

use luthor_document::{Block, IdGenerator, Inline, ListItem, ListType, Tree};
use luthor_runtime::{BlockDirective, BlockRegistry};

use crate::error::CodecError;
use crate::markdown::inline;
use crate::markdown::{DIRECTIVE_PREFIX, DIRECTIVE_SUFFIX};

const IMPORT_SEED: &str = "import";

/// Parse Markdown. Never fails: malformed directives are skipped with a
/// warning and an empty input yields one empty paragraph.
pub fn import(markdown: &str, registry: &BlockRegistry) -> Tree {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut scanner = Scanner {
        lines: &lines,
        ids: IdGenerator::from_seed(IMPORT_SEED),
        registry,
        blocks: Vec::new(),
    };
    scanner.run();
    let mut blocks = scanner.blocks;
    if blocks.is_empty() {
        blocks.push(scanner.ids.factory().paragraph(Vec::new()));
    }
    Tree::new(blocks)
}

/// Parse a directive line. `None` when the line is not a directive at all.
pub fn parse_directive(line: &str) -> Option<Result<BlockDirective, CodecError>> {
    let body = line
        .trim()
        .strip_prefix(DIRECTIVE_PREFIX.trim_end())?
        .strip_suffix(DIRECTIVE_SUFFIX.trim_start())?;
    let directive = serde_json::from_str::<BlockDirective>(body.trim())
        .map_err(|e| CodecError::Directive(e.to_string()));
    Some(directive)
}

struct ListMarker<'l> {
    list_type: ListType,
    nested: bool,
    checked: Option<bool>,
    content: &'l str,
}

fn list_marker(line: &str) -> Option<ListMarker<'_>> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = line.trim_start();

    let (list_type, content) = if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
    {
        (ListType::Bullet, rest)
    } else {
        let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 || digits > 9 {
            return None;
        }
        let rest = trimmed[digits..]
            .strip_prefix(". ")
            .or_else(|| trimmed[digits..].strip_prefix(") "))?;
        (ListType::Number, rest)
    };

    let mut marker = ListMarker {
        list_type,
        nested: indent >= 2,
        checked: None,
        content,
    };
    if list_type == ListType::Bullet {
        for (prefix, checked) in [("[ ] ", false), ("[x] ", true), ("[X] ", true)] {
            if let Some(rest) = content.strip_prefix(prefix) {
                marker.list_type = ListType::Check;
                marker.checked = Some(checked);
                marker.content = rest;
            }
        }
    }
    Some(marker)
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() {
        return Some((hashes as u8, ""));
    }
    rest.strip_prefix(' ').map(|text| (hashes as u8, text.trim()))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(first) = compact.chars().next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && compact.len() >= 3 && compact.chars().all(|c| c == first)
}

fn fence(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let width = trimmed.chars().take_while(|c| *c == marker).count();
    if width < 3 {
        return None;
    }
    Some((marker, width, trimmed[width..].trim()))
}

/// Split a pipe row into raw cell text. Escaped pipes stay in the cell.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator_row(cells: &[String]) -> bool {
    cells.iter().all(|cell| {
        let cell = cell.trim();
        let body = cell.strip_prefix(':').unwrap_or(cell);
        let body = body.strip_suffix(':').unwrap_or(body);
        !body.is_empty() && body.chars().all(|c| c == '-')
    })
}

struct Scanner<'l, 'r> {
    lines: &'l [&'l str],
    ids: IdGenerator,
    registry: &'r BlockRegistry,
    blocks: Vec<Block>,
}

impl<'l, 'r> Scanner<'l, 'r> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];
            if line.trim().is_empty() {
                i += 1;
                continue;
            }
            i += self
                .directive(i)
                .or_else(|| self.code(i))
                .or_else(|| self.heading(i))
                .or_else(|| self.rule(i))
                .or_else(|| self.quote(i))
                .or_else(|| self.table(i))
                .or_else(|| self.list(i))
                .unwrap_or_else(|| self.paragraph(i));
        }
    }

    /// Lines that start some construct other than a paragraph
    fn starts_block(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        parse_directive(line).is_some()
            || fence(line).is_some()
            || heading(trimmed).is_some()
            || is_rule(line)
            || trimmed.starts_with('>')
            || trimmed.starts_with('|')
            || list_marker(line).is_some()
    }

    fn directive(&mut self, i: usize) -> Option<usize> {
        let parsed = parse_directive(self.lines[i])?;
        let directive = match parsed {
            Ok(directive) => directive,
            Err(e) => {
                // The placeholder line that follows is kept as ordinary text
                tracing::warn!(line = i + 1, error = %e, "skipping malformed block directive");
                return Some(1);
            }
        };

        // The next non-empty line is the placeholder
        let mut consumed = 1;
        while let Some(line) = self.lines.get(i + consumed) {
            consumed += 1;
            if !line.trim().is_empty() {
                break;
            }
        }

        match self.registry.reconstruct(&directive, &mut self.ids) {
            Some(block) => self.blocks.push(block),
            None => tracing::warn!(
                node_type = %directive.node_type,
                "no block codec registered, skipping directive"
            ),
        }
        Some(consumed)
    }

    fn code(&mut self, i: usize) -> Option<usize> {
        let (marker, width, info) = fence(self.lines[i])?;
        let language = info
            .split_whitespace()
            .next()
            .filter(|language| !language.is_empty())
            .map(str::to_string);

        let mut body = Vec::new();
        let mut consumed = 1;
        while let Some(line) = self.lines.get(i + consumed) {
            consumed += 1;
            let closes = fence(line).map_or(false, |(m, w, rest)| m == marker && w >= width && rest.is_empty());
            if closes {
                break;
            }
            body.push(*line);
        }
        let block = self.ids.factory().code(language, body.join("\n"));
        self.blocks.push(block);
        Some(consumed)
    }

    fn heading(&mut self, i: usize) -> Option<usize> {
        let (level, text) = heading(self.lines[i].trim_start())?;
        let children = inline::parse(text, &mut self.ids);
        let block = self.ids.factory().heading(level, children);
        self.blocks.push(block);
        Some(1)
    }

    fn rule(&mut self, i: usize) -> Option<usize> {
        if !is_rule(self.lines[i]) {
            return None;
        }
        let block = self.ids.factory().horizontal_rule();
        self.blocks.push(block);
        Some(1)
    }

    fn quote(&mut self, i: usize) -> Option<usize> {
        let quoted: Vec<&str> = self.lines[i..]
            .iter()
            .map_while(|line| line.trim_start().strip_prefix('>'))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
            .collect();
        if quoted.is_empty() {
            return None;
        }
        let children = inline::parse(&quoted.join("\n"), &mut self.ids);
        let block = self.ids.factory().quote(children);
        self.blocks.push(block);
        Some(quoted.len())
    }

    fn table(&mut self, i: usize) -> Option<usize> {
        let rows: Vec<&str> = self.lines[i..]
            .iter()
            .take_while(|line| line.trim_start().starts_with('|'))
            .copied()
            .collect();
        if rows.len() < 2 {
            return None;
        }

        let mut parsed: Vec<Vec<String>> = rows.iter().map(|row| split_cells(row)).collect();
        // Only the row under the header is a delimiter; dash-only rows elsewhere are data
        if is_separator_row(&parsed[1]) {
            parsed.remove(1);
        }
        let columns = parsed[0].len();

        let mut table_rows = Vec::with_capacity(parsed.len());
        for (index, mut cells) in parsed.into_iter().enumerate() {
            cells.resize(cells.len().max(columns), String::new());
            let mut row_cells = Vec::with_capacity(cells.len());
            for cell in cells {
                let children = inline::parse(&cell, &mut self.ids);
                row_cells.push(self.ids.factory().table_cell(index == 0, children));
            }
            table_rows.push(self.ids.factory().table_row(row_cells));
        }
        let block = self.ids.factory().table(table_rows);
        self.blocks.push(block);
        Some(rows.len())
    }

    /// Consecutive items, no blank lines needed. Nested items are written
    /// out as standalone paragraphs between the surrounding lists.
    fn list(&mut self, i: usize) -> Option<usize> {
        let first = list_marker(self.lines[i])?;
        if first.nested {
            return None;
        }
        let list_type = first.list_type;

        let mut items: Vec<ListItem> = Vec::new();
        let mut consumed = 0;
        while let Some(line) = self.lines.get(i + consumed) {
            let Some(marker) = list_marker(line) else {
                // Indented continuation of the previous item
                let continues = !line.trim().is_empty() && line.starts_with(char::is_whitespace);
                match items.last_mut() {
                    Some(item) if continues => {
                        let mut more = inline::parse(line.trim(), &mut self.ids);
                        item.children.push(Inline::Text {
                            key: self.ids.new_id(),
                            text: " ".to_string(),
                            format: Default::default(),
                        });
                        item.children.append(&mut more);
                        consumed += 1;
                        continue;
                    }
                    _ => break,
                }
            };
            if marker.nested || marker.list_type != list_type {
                break;
            }
            let children = inline::parse(marker.content, &mut self.ids);
            let mut item = self.ids.factory().list_item(children);
            item.checked = marker.checked;
            items.push(item);
            consumed += 1;
        }

        let block = self.ids.factory().list(list_type, items);
        self.blocks.push(block);
        Some(consumed)
    }

    fn paragraph(&mut self, i: usize) -> usize {
        // Nested list items land here as plain paragraphs
        let first = self.lines[i];
        let first = list_marker(first).map_or(first.trim(), |marker| marker.content);

        let mut text = vec![first.trim()];
        let mut consumed = 1;
        while let Some(line) = self.lines.get(i + consumed) {
            if line.trim().is_empty() || self.starts_block(line) {
                break;
            }
            text.push(line.trim());
            consumed += 1;
        }
        let children = inline::parse(&text.join("\n"), &mut self.ids);
        let block = self.ids.factory().paragraph(children);
        self.blocks.push(block);
        consumed
    }
}
