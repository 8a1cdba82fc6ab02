//! # Block Transform
//!
//! Maps between the document tree and markup. Export is deterministic so
//! the content hash of the same tree never changes. Import is lenient: it
//! accepts pasted and hand-written markup and always yields at least one
//! block.
//!
//! ```text
//! markup ──▶ dom::parse ──▶ Importer ──▶ Tree (provisional keys)
//! Tree   ──▶ export_block ──▶ Context ──▶ markup
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use luthor_document::{Alignment, Block, IdGenerator, Inline, ListItem, ListType, TextFormat, Tree};
use luthor_runtime::{BlockDirective, BlockRegistry};
use serde_json::{json, Map, Value};

use crate::error::CodecError;
use crate::html::dom::{self, Element, Node};
use crate::html::writer::{escape_html, Context, WriteOptions};

/// Seed for keys assigned during import. The document re-keys imported
/// trees when they are committed.
const IMPORT_SEED: &str = "import";

pub trait MarkupTransform: Send + Sync {
    fn export(&self, tree: &Tree, registry: &BlockRegistry) -> String;

    fn import<'a>(
        &'a self,
        html: &'a str,
        registry: &'a BlockRegistry,
    ) -> BoxFuture<'a, Result<Tree, CodecError>>;
}

#[derive(Debug, Clone, Default)]
pub struct HtmlTransform {
    options: WriteOptions,
}

impl HtmlTransform {
    pub fn new(options: WriteOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, tree: &Tree, registry: &BlockRegistry) -> String {
        let mut ctx = Context::new(self.options.clone());
        for block in &tree.children {
            export_block(&mut ctx, block, registry);
        }
        ctx.get_output()
    }

    pub fn parse_tree(&self, html: &str, registry: &BlockRegistry) -> Result<Tree, CodecError> {
        let root = dom::parse(html)?;
        let mut importer = Importer {
            ids: IdGenerator::from_seed(IMPORT_SEED),
            registry,
        };
        let mut blocks = Vec::new();
        importer.blocks(&root.children, &mut blocks);
        if blocks.is_empty() {
            blocks.push(importer.ids.factory().paragraph(Vec::new()));
        }
        Ok(Tree::new(blocks))
    }
}

impl MarkupTransform for HtmlTransform {
    fn export(&self, tree: &Tree, registry: &BlockRegistry) -> String {
        self.render(tree, registry)
    }

    fn import<'a>(
        &'a self,
        html: &'a str,
        registry: &'a BlockRegistry,
    ) -> BoxFuture<'a, Result<Tree, CodecError>> {
        async move { self.parse_tree(html, registry) }.boxed()
    }
}

// Export

/// Innermost first
const FORMAT_TAGS: [(TextFormat, &str); 7] = [
    (TextFormat::CODE, "code"),
    (TextFormat::SUBSCRIPT, "sub"),
    (TextFormat::SUPERSCRIPT, "sup"),
    (TextFormat::STRIKETHROUGH, "s"),
    (TextFormat::UNDERLINE, "u"),
    (TextFormat::ITALIC, "em"),
    (TextFormat::BOLD, "strong"),
];

fn export_block(ctx: &mut Context, block: &Block, registry: &BlockRegistry) {
    match block {
        Block::Paragraph { align, children, .. } => {
            let open = match align {
                Some(align) => format!(r#"<p style="text-align: {}">"#, align.as_str()),
                None => "<p>".to_string(),
            };
            ctx.add_line(&format!("{}{}</p>", open, render_inlines(children)));
        }
        Block::Heading { level, children, .. } => {
            ctx.add_line(&format!("<h{0}>{1}</h{0}>", level, render_inlines(children)));
        }
        Block::Quote { children, .. } => {
            ctx.add_line(&format!("<blockquote>{}</blockquote>", render_inlines(children)));
        }
        Block::List {
            list_type, items, ..
        } => {
            let (open, close) = match list_type {
                ListType::Bullet => ("<ul>", "</ul>"),
                ListType::Number => ("<ol>", "</ol>"),
                ListType::Check => (r#"<ul data-list="check">"#, "</ul>"),
            };
            ctx.add_line(open);
            ctx.indent();
            for item in items {
                let open = match item.checked {
                    Some(checked) => format!(r#"<li data-checked="{}">"#, checked),
                    None => "<li>".to_string(),
                };
                ctx.add_line(&format!("{}{}</li>", open, render_inlines(&item.children)));
            }
            ctx.dedent();
            ctx.add_line(close);
        }
        Block::Code { language, text, .. } => {
            let class = language
                .as_deref()
                .filter(|language| !language.is_empty())
                .map(|language| format!(r#" class="language-{}""#, escape_html(language)))
                .unwrap_or_default();
            ctx.add_line(&format!("<pre><code{}>{}</code></pre>", class, escape_html(text)));
        }
        Block::Table { rows, .. } => {
            ctx.add_line("<table>");
            ctx.indent();
            for row in rows {
                ctx.add_line("<tr>");
                ctx.indent();
                for cell in &row.cells {
                    let tag = if cell.header { "th" } else { "td" };
                    ctx.add_line(&format!("<{0}>{1}</{0}>", tag, render_inlines(&cell.children)));
                }
                ctx.dedent();
                ctx.add_line("</tr>");
            }
            ctx.dedent();
            ctx.add_line("</table>");
        }
        Block::HorizontalRule { .. } => ctx.add_line("<hr>"),
        Block::Custom {
            node_type, attrs, ..
        } => {
            if let Some(markup) = registry.render_html(block) {
                ctx.add_line(&markup);
                return;
            }
            let codec = registry.get(node_type);
            let payload = codec.map_or_else(|| Value::Object(attrs.clone()), |c| c.serialize(attrs));
            let placeholder = codec.map(|c| c.placeholder(attrs)).unwrap_or_default();
            ctx.add_line(&format!(
                r#"<div data-luthor-node="{}" data-luthor-payload="{}">{}</div>"#,
                escape_html(node_type),
                escape_html(&payload.to_string()),
                escape_html(&placeholder)
            ));
        }
    }
}

pub(crate) fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        render_inline(inline, &mut out);
    }
    out
}

fn render_inline(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Text { text, format, .. } => {
            let mut html = escape_html(text);
            for (flag, tag) in FORMAT_TAGS {
                if format.contains(flag) {
                    html = format!("<{0}>{1}</{0}>", tag, html);
                }
            }
            out.push_str(&html);
        }
        Inline::Link {
            url,
            rel,
            target,
            children,
            ..
        } => {
            out.push_str(&format!(r#"<a href="{}""#, escape_html(url)));
            if let Some(rel) = rel {
                out.push_str(&format!(r#" rel="{}""#, escape_html(rel)));
            }
            if let Some(target) = target {
                out.push_str(&format!(r#" target="{}""#, escape_html(target)));
            }
            out.push('>');
            for child in children {
                render_inline(child, out);
            }
            out.push_str("</a>");
        }
        Inline::LineBreak { .. } => out.push_str("<br>"),
    }
}

// Import

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "abbr"
            | "b"
            | "br"
            | "cite"
            | "code"
            | "del"
            | "em"
            | "font"
            | "i"
            | "ins"
            | "kbd"
            | "label"
            | "mark"
            | "s"
            | "small"
            | "span"
            | "strike"
            | "strong"
            | "sub"
            | "sup"
            | "u"
    )
}

fn is_skipped(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "title" | "meta" | "link" | "script" | "style" | "template" | "noscript"
    )
}

fn is_youtube(src: &str) -> bool {
    src.contains("youtube.com/embed") || src.contains("youtube-nocookie.com/embed") || src.contains("youtu.be/")
}

struct Importer<'a> {
    ids: IdGenerator,
    registry: &'a BlockRegistry,
}

impl<'a> Importer<'a> {
    fn blocks(&mut self, nodes: &[Node], out: &mut Vec<Block>) {
        let mut pending = Vec::new();
        for node in nodes {
            match node {
                Node::Element(element) if !is_inline(&element.tag) => {
                    self.flush(&mut pending, out);
                    self.block_element(element, out);
                }
                _ => self.inline_node(node, TextFormat::empty(), &mut pending),
            }
        }
        self.flush(&mut pending, out);
    }

    /// Stray inline content becomes its own paragraph
    fn flush(&mut self, pending: &mut Vec<Inline>, out: &mut Vec<Block>) {
        let inlines = finish_inlines(std::mem::take(pending));
        if !inlines.is_empty() {
            out.push(self.ids.factory().paragraph(inlines));
        }
    }

    fn block_element(&mut self, element: &Element, out: &mut Vec<Block>) {
        let tag = element.tag.as_str();
        match tag {
            "p" => {
                let children = self.inlines(&element.children);
                let mut block = self.ids.factory().paragraph(children);
                if let Block::Paragraph { align, .. } = &mut block {
                    *align = element.style("text-align").and_then(Alignment::parse);
                }
                out.push(block);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag.as_bytes()[1] - b'0';
                let children = self.inlines(&element.children);
                out.push(self.ids.factory().heading(level, children));
            }
            "blockquote" => {
                let children = self.inlines(&element.children);
                out.push(self.ids.factory().quote(children));
            }
            "ul" | "ol" => {
                let list_type = if tag == "ol" {
                    ListType::Number
                } else if element.attr("data-list") == Some("check")
                    || element.has_class("contains-task-list")
                {
                    ListType::Check
                } else {
                    ListType::Bullet
                };
                let mut items = Vec::new();
                self.list_items(element, list_type, &mut items);
                if !items.is_empty() {
                    out.push(self.ids.factory().list(list_type, items));
                }
            }
            "pre" => out.push(self.code_block(element)),
            "table" => {
                if let Some(table) = self.table(element) {
                    out.push(table);
                }
            }
            "hr" => out.push(self.ids.factory().horizontal_rule()),
            "img" | "iframe" => {
                if let Some(block) = self.embedded(element) {
                    out.push(block);
                }
            }
            "figure" if element.find("img").is_some() => {
                if let Some(block) = self.embedded(element) {
                    out.push(block);
                }
            }
            _ if is_skipped(tag) => {}
            _ if element.attr("data-luthor-node").is_some() => {
                if let Some(block) = self.embedded(element) {
                    out.push(block);
                }
            }
            _ if element.elements().any(|child| !is_inline(&child.tag)) => {
                self.blocks(&element.children, out);
            }
            _ => {
                let children = self.inlines(&element.children);
                if !children.is_empty() {
                    out.push(self.ids.factory().paragraph(children));
                }
            }
        }
    }

    /// Images, frames and serialized extension blocks
    fn embedded(&mut self, element: &Element) -> Option<Block> {
        match element.tag.as_str() {
            "img" => self.media("image", image_payload(element, None)),
            "figure" => {
                let img = element.find("img")?;
                let caption = element.find("figcaption").map(|c| c.text_content());
                self.media("image", image_payload(img, caption))
            }
            "iframe" => {
                let src = element.attr("src").unwrap_or_default();
                let node_type = if is_youtube(src) && self.registry.contains("youtube-embed") {
                    "youtube-embed"
                } else {
                    "iframe-embed"
                };
                let payload = json!({
                    "src": src,
                    "width": element.attr("width"),
                    "height": element.attr("height"),
                    "title": element.attr("title"),
                });
                self.media(node_type, payload)
            }
            _ => {
                let node_type = element.attr("data-luthor-node")?;
                let payload = element
                    .attr("data-luthor-payload")
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or(Value::Object(Map::new()));
                self.media(node_type, payload)
            }
        }
    }

    /// Rebuild a registered block type. Unregistered types are dropped.
    fn media(&mut self, node_type: &str, payload: Value) -> Option<Block> {
        let directive = BlockDirective {
            node_type: node_type.to_string(),
            payload,
        };
        let block = self.registry.reconstruct(&directive, &mut self.ids);
        if block.is_none() {
            tracing::warn!(node_type, "no codec registered for imported block, dropping it");
        }
        block
    }

    fn list_items(&mut self, list: &Element, list_type: ListType, items: &mut Vec<ListItem>) {
        for child in list.elements() {
            match child.tag.as_str() {
                "li" => {
                    let inline_nodes: Vec<Node> = child
                        .children
                        .iter()
                        .filter(|node| !matches!(node, Node::Element(e) if e.tag == "ul" || e.tag == "ol"))
                        .cloned()
                        .collect();
                    let children = self.inlines(&inline_nodes);
                    let mut item = self.ids.factory().list_item(children);
                    item.checked = list_checked(child, list_type);
                    items.push(item);

                    for nested in child.elements().filter(|e| e.tag == "ul" || e.tag == "ol") {
                        self.list_items(nested, list_type, items);
                    }
                }
                "ul" | "ol" => self.list_items(child, list_type, items),
                _ => {}
            }
        }
    }

    fn code_block(&mut self, pre: &Element) -> Block {
        let code = pre.find("code");
        let language = code
            .into_iter()
            .chain(std::iter::once(pre))
            .flat_map(|e| e.classes())
            .find_map(|class| class.strip_prefix("language-"))
            .or_else(|| pre.attr("data-language"))
            .filter(|language| !language.is_empty())
            .map(str::to_string);
        let text = pre.text_content();
        let text = text.strip_prefix('\n').unwrap_or(&text);
        self.ids.factory().code(language, text)
    }

    fn table(&mut self, table: &Element) -> Option<Block> {
        let mut rows = Vec::new();
        for child in table.elements() {
            match child.tag.as_str() {
                "tr" => rows.push(self.table_row(child)),
                "thead" | "tbody" | "tfoot" => {
                    for row in child.elements().filter(|e| e.tag == "tr") {
                        rows.push(self.table_row(row));
                    }
                }
                _ => {}
            }
        }
        if rows.is_empty() {
            return None;
        }
        Some(self.ids.factory().table(rows))
    }

    fn table_row(&mut self, row: &Element) -> luthor_document::TableRow {
        let mut cells = Vec::new();
        for cell in row.elements().filter(|e| e.tag == "td" || e.tag == "th") {
            let children = self.inlines(&cell.children);
            cells.push(self.ids.factory().table_cell(cell.tag == "th", children));
        }
        self.ids.factory().table_row(cells)
    }

    fn inlines(&mut self, nodes: &[Node]) -> Vec<Inline> {
        let mut out = Vec::new();
        for node in nodes {
            self.inline_node(node, TextFormat::empty(), &mut out);
        }
        finish_inlines(out)
    }

    fn inline_node(&mut self, node: &Node, format: TextFormat, out: &mut Vec<Inline>) {
        match node {
            Node::Text(text) => {
                let text = collapse_whitespace(text);
                if !text.is_empty() {
                    out.push(self.ids.factory().formatted(text, format));
                }
            }
            Node::Comment(_) => {}
            Node::Element(element) => self.inline_element(element, format, out),
        }
    }

    fn inline_element(&mut self, element: &Element, format: TextFormat, out: &mut Vec<Inline>) {
        match element.tag.as_str() {
            "br" => out.push(self.ids.factory().line_break()),
            "a" => {
                let mut children = Vec::new();
                for child in &element.children {
                    self.inline_node(child, format, &mut children);
                }
                let children = merge_texts(children);
                match element.attr("href").filter(|href| !href.is_empty()) {
                    Some(href) => out.push(Inline::Link {
                        key: self.ids.new_id(),
                        url: href.to_string(),
                        rel: element.attr("rel").map(str::to_string),
                        target: element.attr("target").map(str::to_string),
                        children,
                    }),
                    None => out.extend(children),
                }
            }
            "img" | "iframe" => {}
            tag if is_skipped(tag) => {}
            tag => {
                if !is_inline(tag) && !out.is_empty() {
                    out.push(self.ids.factory().line_break());
                }
                let format = format | element_format(element);
                for child in &element.children {
                    self.inline_node(child, format, out);
                }
            }
        }
    }
}

fn list_checked(item: &Element, list_type: ListType) -> Option<bool> {
    let explicit = item
        .attr("data-checked")
        .or_else(|| item.attr("aria-checked"))
        .map(|value| value == "true")
        .or_else(|| {
            item.elements()
                .find(|e| e.tag == "input" && e.attr("type") == Some("checkbox"))
                .map(|input| input.attr("checked").is_some())
        });
    match list_type {
        ListType::Check => Some(explicit.unwrap_or(false)),
        _ => explicit,
    }
}

fn element_format(element: &Element) -> TextFormat {
    let mut format = match element.tag.as_str() {
        "strong" | "b" => TextFormat::BOLD,
        "em" | "i" | "cite" => TextFormat::ITALIC,
        "u" | "ins" => TextFormat::UNDERLINE,
        "s" | "del" | "strike" => TextFormat::STRIKETHROUGH,
        "code" | "kbd" => TextFormat::CODE,
        "sub" => TextFormat::SUBSCRIPT,
        "sup" => TextFormat::SUPERSCRIPT,
        _ => TextFormat::empty(),
    };
    if let Some(weight) = element.style("font-weight") {
        if matches!(weight, "bold" | "bolder" | "600" | "700" | "800" | "900") {
            format |= TextFormat::BOLD;
        }
    }
    if element.style("font-style") == Some("italic") {
        format |= TextFormat::ITALIC;
    }
    if let Some(decoration) = element.style("text-decoration") {
        if decoration.contains("underline") {
            format |= TextFormat::UNDERLINE;
        }
        if decoration.contains("line-through") {
            format |= TextFormat::STRIKETHROUGH;
        }
    }
    format
}

fn image_payload(img: &Element, caption: Option<String>) -> Value {
    json!({
        "src": img.attr("src"),
        "alt": img.attr("alt"),
        "caption": caption,
        "width": img.attr("width"),
        "height": img.attr("height"),
    })
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Join neighbouring text runs that share a format
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
                if previous.ends_with(' ') {
                    previous.push_str(text.trim_start_matches(' '));
                } else {
                    previous.push_str(text);
                }
                continue;
            }
        }
        merged.push(inline);
    }
    merged
}

/// Merge runs and trim whitespace at the block edges
fn finish_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut inlines = merge_texts(inlines);
    while let Some(Inline::Text { text, .. }) = inlines.first_mut() {
        let trimmed = text.trim_start_matches(' ').to_string();
        if trimmed.is_empty() {
            inlines.remove(0);
        } else {
            *text = trimmed;
            break;
        }
    }
    while let Some(Inline::Text { text, .. }) = inlines.last_mut() {
        let trimmed = text.trim_end_matches(' ').to_string();
        if trimmed.is_empty() {
            inlines.pop();
        } else {
            *text = trimmed;
            break;
        }
    }
    while matches!(inlines.last(), Some(Inline::LineBreak { .. })) {
        inlines.pop();
    }
    inlines
}
