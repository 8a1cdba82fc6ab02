//! Inline Markdown: emphasis, strikethrough, code spans and links

use luthor_document::{IdGenerator, Inline, TextFormat};

const ESCAPED: &[char] = &['\\', '*', '_', '`', '[', ']', '~'];

/// Render inline children. Line breaks become newlines.
pub fn render(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        render_inline(inline, &mut out);
    }
    escape_line_starts(&out)
}

/// Render on a single line, for list items, headings and table cells
pub fn render_single_line(inlines: &[Inline]) -> String {
    render(inlines).replace('\n', " ")
}

/// Render a table cell. Pipes are escaped so they do not split the row.
pub fn render_cell(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        render_inline(inline, &mut out);
    }
    protect_edges(&out.replace('\n', " ").replace('|', "\\|"))
}

fn render_inline(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Text { text, format, .. } => out.push_str(&render_text(text, *format)),
        Inline::Link { url, children, .. } => {
            out.push('[');
            for child in children {
                render_inline(child, out);
            }
            out.push_str("](");
            out.push_str(&url.replace(' ', "%20").replace(')', "%29"));
            out.push(')');
        }
        Inline::LineBreak { .. } => out.push('\n'),
    }
}

fn render_text(text: &str, format: TextFormat) -> String {
    // Markers must hug the text, so surrounding spaces stay outside
    let content = text.trim();
    if content.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let (leading, trailing) = (&text[..start], &text[start + content.len()..]);

    let mut body = if format.contains(TextFormat::CODE) {
        code_span(content)
    } else {
        escape(content)
    };
    if format.contains(TextFormat::STRIKETHROUGH) {
        body = format!("~~{}~~", body);
    }
    if format.contains(TextFormat::ITALIC) {
        body = format!("*{}*", body);
    }
    if format.contains(TextFormat::BOLD) {
        body = format!("**{}**", body);
    }
    format!("{}{}{}", leading, body, trailing)
}

fn code_span(text: &str) -> String {
    let longest = longest_run(text, '`');
    let fence = "`".repeat(longest + 1);
    if longest > 0 {
        format!("{} {} {}", fence, text, fence)
    } else {
        format!("{}{}{}", fence, text, fence)
    }
}

pub(crate) fn longest_run(text: &str, marker: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == marker {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        // `&#` would otherwise read back as a character reference
        if ESCAPED.contains(&c) || (c == '&' && chars.peek() == Some(&'#')) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Spaces and tabs at either end of a line are trimmed on import, so they
/// are written as character references
fn protect_edges(line: &str) -> String {
    let blank = |c: char| c == ' ' || c == '\t';
    let rest = line.trim_start_matches(blank);
    let lead = &line[..line.len() - rest.len()];
    let middle = rest.trim_end_matches(blank);
    let trail = &rest[middle.len()..];
    if lead.is_empty() && trail.is_empty() {
        return line.to_string();
    }
    format!("{}{}{}", references(lead), middle, references(trail))
}

fn references(blank: &str) -> String {
    blank.chars().map(|c| format!("&#{};", u32::from(c))).collect()
}

/// Escape characters that would start a block construct at the start of a
/// line, and keep edge whitespace
fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let first = line.chars().next();
            let line = match first {
                Some('#' | '>' | '-' | '+' | '|' | '<') => format!("\\{}", line),
                Some(c) if c.is_ascii_digit() => {
                    let digits = line.chars().take_while(char::is_ascii_digit).count();
                    let rest = &line[digits..];
                    if rest.starts_with(". ") || rest.starts_with(") ") {
                        format!("{}\\{}", &line[..digits], rest)
                    } else {
                        line.to_string()
                    }
                }
                _ => line.to_string(),
            };
            protect_edges(&line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse inline Markdown into inline nodes keyed from `ids`
pub fn parse(text: &str, ids: &mut IdGenerator) -> Vec<Inline> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = InlineParser { chars: &chars, ids };
    let inlines = parser.parse_range(0, chars.len(), TextFormat::empty());
    merge_texts(inlines)
}

struct InlineParser<'a, 'i> {
    chars: &'a [char],
    ids: &'i mut IdGenerator,
}

impl<'a, 'i> InlineParser<'a, 'i> {
    fn parse_range(&mut self, start: usize, end: usize, format: TextFormat) -> Vec<Inline> {
        let mut out = Vec::new();
        let mut buffer = String::new();
        let mut i = start;

        while i < end {
            let c = self.chars[i];
            match c {
                '\\' if i + 1 < end && self.chars[i + 1].is_ascii_punctuation() => {
                    buffer.push(self.chars[i + 1]);
                    i += 2;
                }
                '&' => match self.character_reference(i, end) {
                    Some((decoded, after)) => {
                        buffer.push(decoded);
                        i = after;
                    }
                    None => {
                        buffer.push(c);
                        i += 1;
                    }
                },
                '\n' => {
                    self.flush(&mut buffer, format, &mut out);
                    out.push(self.ids.factory().line_break());
                    i += 1;
                }
                '`' => {
                    let run = self.run_length(i, end, '`');
                    match self.find_closing_run(i + run, end, '`', run) {
                        Some(close) => {
                            self.flush(&mut buffer, format, &mut out);
                            let code: String = self.chars[i + run..close].iter().collect();
                            let code = match code.strip_prefix(' ').and_then(|c| c.strip_suffix(' ')) {
                                Some(inner) if !inner.trim().is_empty() => inner.to_string(),
                                _ => code,
                            };
                            out.push(self.ids.factory().formatted(code, format | TextFormat::CODE));
                            i = close + run;
                        }
                        None => {
                            buffer.extend(&self.chars[i..i + run]);
                            i += run;
                        }
                    }
                }
                '*' | '_' | '~' => {
                    let run = self.run_length(i, end, c);
                    match self.emphasis(i, end, c, run) {
                        Some((flag, width, close)) => {
                            self.flush(&mut buffer, format, &mut out);
                            let inner = self.parse_range(i + width, close, format | flag);
                            out.extend(inner);
                            i = close + width;
                        }
                        None => {
                            buffer.extend(&self.chars[i..i + run]);
                            i += run;
                        }
                    }
                }
                '[' => match self.link(i, end) {
                    Some((label_end, url, after)) => {
                        self.flush(&mut buffer, format, &mut out);
                        let children = merge_texts(self.parse_range(i + 1, label_end, format));
                        out.push(Inline::Link {
                            key: self.ids.new_id(),
                            url,
                            rel: None,
                            target: None,
                            children,
                        });
                        i = after;
                    }
                    None => {
                        buffer.push(c);
                        i += 1;
                    }
                },
                _ => {
                    buffer.push(c);
                    i += 1;
                }
            }
        }
        self.flush(&mut buffer, format, &mut out);
        out
    }

    fn flush(&mut self, buffer: &mut String, format: TextFormat, out: &mut Vec<Inline>) {
        if !buffer.is_empty() {
            out.push(self.ids.factory().formatted(std::mem::take(buffer), format));
        }
    }

    /// Decimal `&#NN;` reference: the character and the index after `;`
    fn character_reference(&self, i: usize, end: usize) -> Option<(char, usize)> {
        if i + 2 > end || self.chars[i + 1] != '#' {
            return None;
        }
        let digits: String = self.chars[i + 2..end]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .take(7)
            .collect();
        let semicolon = i + 2 + digits.len();
        if digits.is_empty() || semicolon >= end || self.chars[semicolon] != ';' {
            return None;
        }
        let decoded = digits.parse::<u32>().ok().and_then(char::from_u32)?;
        Some((decoded, semicolon + 1))
    }

    fn run_length(&self, start: usize, end: usize, marker: char) -> usize {
        self.chars[start..end]
            .iter()
            .take_while(|c| **c == marker)
            .count()
    }

    /// Start of the next run of exactly `width` markers at or after `from`
    fn find_closing_run(&self, from: usize, end: usize, marker: char, width: usize) -> Option<usize> {
        let mut j = from;
        while j < end {
            if self.chars[j] == '\\' && marker != '`' {
                j += 2;
                continue;
            }
            if self.chars[j] == marker {
                let run = self.run_length(j, end, marker);
                if run == width {
                    return Some(j);
                }
                // `***` closes an inner and an outer emphasis together
                if run == 3 && width < 3 && matches!(marker, '*' | '_') {
                    return Some(j + run - width);
                }
                j += run;
            } else {
                j += 1;
            }
        }
        None
    }

    /// Format flag, marker width and closing position for an emphasis run
    fn emphasis(&self, i: usize, end: usize, marker: char, run: usize) -> Option<(TextFormat, usize, usize)> {
        let (flag, width) = match (marker, run) {
            ('~', 2) => (TextFormat::STRIKETHROUGH, 2),
            ('~', _) => return None,
            (_, 1) => (TextFormat::ITALIC, 1),
            (_, 2) => (TextFormat::BOLD, 2),
            (_, 3) => (TextFormat::BOLD | TextFormat::ITALIC, 3),
            _ => return None,
        };
        // Intraword underscores are literal
        if marker == '_' && i > 0 && self.chars[i - 1].is_alphanumeric() {
            return None;
        }
        let open_next = *self.chars.get(i + width)?;
        if open_next.is_whitespace() {
            return None;
        }

        let mut from = i + width;
        loop {
            let close = self.find_closing_run(from, end, marker, width)?;
            let before = self.chars[close - 1];
            let after = self.chars.get(close + width).copied();
            let word_after = marker == '_' && after.map_or(false, char::is_alphanumeric);
            if close > i + width && !before.is_whitespace() && !word_after {
                return Some((flag, width, close));
            }
            from = close + width;
        }
    }

    /// `[label](url)`: end of label, url and the index after `)`
    fn link(&self, i: usize, end: usize) -> Option<(usize, String, usize)> {
        let mut depth = 0;
        let mut j = i + 1;
        let label_end = loop {
            if j >= end {
                return None;
            }
            match self.chars[j] {
                '\\' => j += 1,
                '[' => depth += 1,
                ']' if depth == 0 => break j,
                ']' => depth -= 1,
                _ => {}
            }
            j += 1;
        };
        if self.chars.get(label_end + 1) != Some(&'(') {
            return None;
        }
        let url_start = label_end + 2;
        let url_end = (url_start..end).find(|k| self.chars[*k] == ')')?;
        let url: String = self.chars[url_start..url_end].iter().collect();
        let url = url.trim().trim_start_matches('<').trim_end_matches('>');
        Some((label_end, url.to_string(), url_end + 1))
    }
}

/// Join neighbouring text runs with the same format
fn merge_texts(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut merged: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        if let (
            Some(Inline::Text {
                text: previous,
                format: previous_format,
                ..
            }),
            Inline::Text { text, format, .. },
        ) = (merged.last_mut(), &inline)
        {
            if previous_format == format {
                previous.push_str(text);
                continue;
            }
        }
        merged.push(inline);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> Vec<Inline> {
        let mut ids = IdGenerator::from_seed("md");
        parse(text, &mut ids)
    }

    fn runs(inlines: &[Inline]) -> Vec<(String, u32)> {
        inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text { text, format, .. } => (text.clone(), format.bits()),
                other => (other.text_content(), u32::MAX),
            })
            .collect()
    }

    #[test]
    fn test_parse_emphasis() {
        let inlines = parse_str("a **bold** and *it* plus ~~gone~~");
        assert_eq!(
            runs(&inlines),
            vec![
                ("a ".to_string(), 0),
                ("bold".to_string(), TextFormat::BOLD.bits()),
                (" and ".to_string(), 0),
                ("it".to_string(), TextFormat::ITALIC.bits()),
                (" plus ".to_string(), 0),
                ("gone".to_string(), TextFormat::STRIKETHROUGH.bits()),
            ]
        );
    }

    #[test]
    fn test_nested_and_unclosed_markers() {
        let inlines = parse_str("**bold *both***");
        assert_eq!(
            runs(&inlines),
            vec![
                ("bold ".to_string(), TextFormat::BOLD.bits()),
                ("both".to_string(), (TextFormat::BOLD | TextFormat::ITALIC).bits()),
            ]
        );
        assert_eq!(runs(&parse_str("2 * 3 = 6")), vec![("2 * 3 = 6".to_string(), 0)]);
        assert_eq!(runs(&parse_str("snake_case_name")), vec![("snake_case_name".to_string(), 0)]);
    }

    #[test]
    fn test_code_span_and_escapes() {
        let inlines = parse_str(r"use `a*b` not \*this\*");
        assert_eq!(
            runs(&inlines),
            vec![
                ("use ".to_string(), 0),
                ("a*b".to_string(), TextFormat::CODE.bits()),
                (" not *this*".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_link() {
        let inlines = parse_str("see [the **docs**](https://example.com) now");
        let Inline::Link { url, children, .. } = &inlines[1] else {
            panic!("expected link");
        };
        assert_eq!(url, "https://example.com");
        assert_eq!(children.len(), 2);
        assert_eq!(runs(&parse_str("[not a link]")), vec![("[not a link]".to_string(), 0)]);
    }

    #[test]
    fn test_render_formats() {
        let mut ids = IdGenerator::from_seed("md");
        let mut f = ids.factory();
        let inlines = vec![
            f.formatted("bold ", TextFormat::BOLD),
            f.text("2*3 "),
            f.formatted("x`y", TextFormat::CODE),
            f.formatted("under", TextFormat::UNDERLINE),
        ];
        assert_eq!(render(&inlines), r"**bold** 2\*3 `` x`y ``under");
    }

    #[test]
    fn test_edge_whitespace_survives() {
        let mut ids = IdGenerator::from_seed("md");
        let mut f = ids.factory();
        let inlines = vec![f.text("  indented"), f.line_break(), f.text("tail\t")];
        let rendered = render(&inlines);
        assert_eq!(rendered, "&#32;&#32;indented\ntail&#9;");

        let parsed = parse_str(&rendered);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].text_content(), "  indented");
        assert_eq!(parsed[2].text_content(), "tail\t");
    }

    #[test]
    fn test_literal_reference_text_is_escaped() {
        let mut ids = IdGenerator::from_seed("md");
        let inlines = vec![ids.factory().text("AT&T writes &#32; literally")];
        let rendered = render(&inlines);
        assert_eq!(rendered, "AT&T writes \\&#32; literally");
        assert_eq!(runs(&parse_str(&rendered)), vec![("AT&T writes &#32; literally".to_string(), 0)]);
        assert_eq!(runs(&parse_str("&#bogus; & done")), vec![("&#bogus; & done".to_string(), 0)]);
    }

    #[test]
    fn test_render_escapes_block_markers_at_line_start() {
        let mut ids = IdGenerator::from_seed("md");
        let mut f = ids.factory();
        let inlines = vec![f.text("# not a heading"), f.line_break(), f.text("1. not a list")];
        assert_eq!(render(&inlines), "\\# not a heading\n1\\. not a list");
    }
}
