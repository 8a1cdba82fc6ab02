//! # Document Tree
//!
//! Block and inline node types for rich documents.
//!
//! Every node carries a stable key issued by [`crate::IdGenerator`]. Blocks
//! form the top level of the tree; inline nodes live inside paragraphs,
//! headings, quotes, list items and table cells.
//!
//! Node types that are not built in (images, embeds, ...) are represented
//! as [`Block::Custom`] with a `nodeType` tag and a free-form attribute map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{BitOr, BitOrAssign};

/// Stable node identifier
pub type NodeKey = String;

/// Root of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
    Check,
}

/// Inline text format bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextFormat(u32);

impl TextFormat {
    pub const BOLD: TextFormat = TextFormat(1);
    pub const ITALIC: TextFormat = TextFormat(1 << 1);
    pub const STRIKETHROUGH: TextFormat = TextFormat(1 << 2);
    pub const UNDERLINE: TextFormat = TextFormat(1 << 3);
    pub const CODE: TextFormat = TextFormat(1 << 4);
    pub const SUBSCRIPT: TextFormat = TextFormat(1 << 5);
    pub const SUPERSCRIPT: TextFormat = TextFormat(1 << 6);

    pub const fn empty() -> Self {
        TextFormat(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        TextFormat(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: TextFormat) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: TextFormat) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: TextFormat) {
        self.0 &= !other.0;
    }

    /// Look up a format flag by its command-facing name (`"bold"`, `"code"`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bold" => Some(Self::BOLD),
            "italic" => Some(Self::ITALIC),
            "strikethrough" => Some(Self::STRIKETHROUGH),
            "underline" => Some(Self::UNDERLINE),
            "code" => Some(Self::CODE),
            "subscript" => Some(Self::SUBSCRIPT),
            "superscript" => Some(Self::SUPERSCRIPT),
            _ => None,
        }
    }
}

impl BitOr for TextFormat {
    type Output = TextFormat;

    fn bitor(self, rhs: TextFormat) -> TextFormat {
        TextFormat(self.0 | rhs.0)
    }
}

impl BitOrAssign for TextFormat {
    fn bitor_assign(&mut self, rhs: TextFormat) {
        self.0 |= rhs.0;
    }
}

/// Top-level node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Paragraph {
        key: NodeKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<Alignment>,
        #[serde(default)]
        children: Vec<Inline>,
    },
    Heading {
        key: NodeKey,
        level: u8,
        #[serde(default)]
        children: Vec<Inline>,
    },
    Quote {
        key: NodeKey,
        #[serde(default)]
        children: Vec<Inline>,
    },
    List {
        key: NodeKey,
        #[serde(rename = "listType")]
        list_type: ListType,
        #[serde(default)]
        items: Vec<ListItem>,
    },
    Code {
        key: NodeKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        theme: Option<String>,
        #[serde(default)]
        text: String,
    },
    Table {
        key: NodeKey,
        #[serde(default)]
        rows: Vec<TableRow>,
    },
    HorizontalRule {
        key: NodeKey,
    },
    Custom {
        key: NodeKey,
        #[serde(rename = "nodeType")]
        node_type: String,
        #[serde(default)]
        attrs: Map<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub key: NodeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default)]
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: NodeKey,
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub key: NodeKey,
    #[serde(default)]
    pub header: bool,
    #[serde(default)]
    pub children: Vec<Inline>,
}

/// Node nested inside a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Inline {
    Text {
        key: NodeKey,
        text: String,
        #[serde(default, skip_serializing_if = "TextFormat::is_empty")]
        format: TextFormat,
    },
    Link {
        key: NodeKey,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default)]
        children: Vec<Inline>,
    },
    LineBreak {
        key: NodeKey,
    },
}

impl Block {
    pub fn key(&self) -> &str {
        match self {
            Block::Paragraph { key, .. }
            | Block::Heading { key, .. }
            | Block::Quote { key, .. }
            | Block::List { key, .. }
            | Block::Code { key, .. }
            | Block::Table { key, .. }
            | Block::HorizontalRule { key }
            | Block::Custom { key, .. } => key,
        }
    }

    /// Node type tag as seen by the extension runtime
    pub fn node_type(&self) -> &str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { .. } => "heading",
            Block::Quote { .. } => "quote",
            Block::List { .. } => "list",
            Block::Code { .. } => "code",
            Block::Table { .. } => "table",
            Block::HorizontalRule { .. } => "horizontal-rule",
            Block::Custom { node_type, .. } => node_type,
        }
    }

    /// Inline children of text-bearing blocks
    pub fn inlines(&self) -> Option<&Vec<Inline>> {
        match self {
            Block::Paragraph { children, .. }
            | Block::Heading { children, .. }
            | Block::Quote { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn inlines_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Block::Paragraph { children, .. }
            | Block::Heading { children, .. }
            | Block::Quote { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Plain text of the block. List items are separated by newlines and
    /// table cells by tabs.
    pub fn text_content(&self) -> String {
        match self {
            Block::Paragraph { children, .. }
            | Block::Heading { children, .. }
            | Block::Quote { children, .. } => inline_text(children),
            Block::List { items, .. } => items
                .iter()
                .map(|item| inline_text(&item.children))
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Code { text, .. } => text.clone(),
            Block::Table { rows, .. } => rows
                .iter()
                .map(|row| {
                    row.cells
                        .iter()
                        .map(|cell| inline_text(&cell.children))
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::HorizontalRule { .. } | Block::Custom { .. } => String::new(),
        }
    }
}

impl Inline {
    pub fn key(&self) -> &str {
        match self {
            Inline::Text { key, .. } | Inline::Link { key, .. } | Inline::LineBreak { key } => key,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Inline::Text { text, .. } => text.clone(),
            Inline::Link { children, .. } => inline_text(children),
            Inline::LineBreak { .. } => "\n".to_string(),
        }
    }
}

pub fn inline_text(children: &[Inline]) -> String {
    children.iter().map(Inline::text_content).collect()
}

/// Borrowed view of any node in the tree
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Block(&'a Block),
    ListItem(&'a ListItem),
    TableRow(&'a TableRow),
    TableCell(&'a TableCell),
    Inline(&'a Inline),
}

impl<'a> NodeRef<'a> {
    pub fn key(&self) -> &'a str {
        match self {
            NodeRef::Block(block) => block.key(),
            NodeRef::ListItem(item) => &item.key,
            NodeRef::TableRow(row) => &row.key,
            NodeRef::TableCell(cell) => &cell.key,
            NodeRef::Inline(inline) => inline.key(),
        }
    }
}

impl Tree {
    pub fn new(children: Vec<Block>) -> Self {
        Self { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Plain text of the whole document, one line per block
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .map(Block::text_content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Index of the top-level block that contains `key`
    pub fn block_index(&self, key: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|block| block.key() == key || block_contains(block, key))
    }

    pub fn block(&self, key: &str) -> Option<&Block> {
        self.block_index(key).map(|index| &self.children[index])
    }

    pub fn find(&self, key: &str) -> Option<NodeRef<'_>> {
        for block in &self.children {
            if block.key() == key {
                return Some(NodeRef::Block(block));
            }
            if let Some(found) = find_in_block(block, key) {
                return Some(found);
            }
        }
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn block_by_key_mut(&mut self, key: &str) -> Option<&mut Block> {
        self.children.iter_mut().find(|block| block.key() == key)
    }

    pub fn inline_mut(&mut self, key: &str) -> Option<&mut Inline> {
        self.children
            .iter_mut()
            .find_map(|block| find_inline_in_block_mut(block, key))
    }

    pub fn list_item_mut(&mut self, key: &str) -> Option<&mut ListItem> {
        self.children.iter_mut().find_map(|block| match block {
            Block::List { items, .. } => items.iter_mut().find(|item| item.key == key),
            _ => None,
        })
    }

    /// The inline vector holding `key` and the key's position in it
    pub fn inline_siblings_mut(&mut self, key: &str) -> Option<(&mut Vec<Inline>, usize)> {
        self.children
            .iter_mut()
            .find_map(|block| inline_siblings_in_block(block, key))
    }

    /// Keys of every text node in document order
    pub fn text_keys(&self) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        for block in &self.children {
            collect_block_text_keys(block, &mut keys);
        }
        keys
    }

    /// Compare block structure and text, ignoring keys
    pub fn same_structure(&self, other: &Tree) -> bool {
        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| same_block(a, b))
    }
}

fn block_contains(block: &Block, key: &str) -> bool {
    find_in_block(block, key).is_some()
}

fn find_in_block<'a>(block: &'a Block, key: &str) -> Option<NodeRef<'a>> {
    match block {
        Block::Paragraph { children, .. }
        | Block::Heading { children, .. }
        | Block::Quote { children, .. } => find_in_inlines(children, key),
        Block::List { items, .. } => items.iter().find_map(|item| {
            if item.key == key {
                Some(NodeRef::ListItem(item))
            } else {
                find_in_inlines(&item.children, key)
            }
        }),
        Block::Table { rows, .. } => rows.iter().find_map(|row| {
            if row.key == key {
                return Some(NodeRef::TableRow(row));
            }
            row.cells.iter().find_map(|cell| {
                if cell.key == key {
                    Some(NodeRef::TableCell(cell))
                } else {
                    find_in_inlines(&cell.children, key)
                }
            })
        }),
        _ => None,
    }
}

fn find_in_inlines<'a>(inlines: &'a [Inline], key: &str) -> Option<NodeRef<'a>> {
    for inline in inlines {
        if inline.key() == key {
            return Some(NodeRef::Inline(inline));
        }
        if let Inline::Link { children, .. } = inline {
            if let Some(found) = find_in_inlines(children, key) {
                return Some(found);
            }
        }
    }
    None
}

fn find_inline_in_block_mut<'a>(block: &'a mut Block, key: &str) -> Option<&'a mut Inline> {
    inline_siblings_in_block(block, key).map(|(siblings, index)| &mut siblings[index])
}

fn inline_siblings_in_block<'a>(
    block: &'a mut Block,
    key: &str,
) -> Option<(&'a mut Vec<Inline>, usize)> {
    match block {
        Block::Paragraph { children, .. }
        | Block::Heading { children, .. }
        | Block::Quote { children, .. } => inline_siblings(children, key),
        Block::List { items, .. } => items
            .iter_mut()
            .find_map(|item| inline_siblings(&mut item.children, key)),
        Block::Table { rows, .. } => rows.iter_mut().find_map(|row| {
            row.cells
                .iter_mut()
                .find_map(|cell| inline_siblings(&mut cell.children, key))
        }),
        _ => None,
    }
}

fn inline_siblings<'a>(inlines: &'a mut Vec<Inline>, key: &str) -> Option<(&'a mut Vec<Inline>, usize)> {
    if let Some(index) = inlines.iter().position(|inline| inline.key() == key) {
        return Some((inlines, index));
    }
    for inline in inlines.iter_mut() {
        if let Inline::Link { children, .. } = inline {
            if let Some(found) = inline_siblings(children, key) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_block_text_keys(block: &Block, keys: &mut Vec<NodeKey>) {
    match block {
        Block::Paragraph { children, .. }
        | Block::Heading { children, .. }
        | Block::Quote { children, .. } => collect_inline_text_keys(children, keys),
        Block::List { items, .. } => {
            for item in items {
                collect_inline_text_keys(&item.children, keys);
            }
        }
        Block::Table { rows, .. } => {
            for cell in rows.iter().flat_map(|row| &row.cells) {
                collect_inline_text_keys(&cell.children, keys);
            }
        }
        _ => {}
    }
}

fn collect_inline_text_keys(inlines: &[Inline], keys: &mut Vec<NodeKey>) {
    for inline in inlines {
        match inline {
            Inline::Text { key, .. } => keys.push(key.clone()),
            Inline::Link { children, .. } => collect_inline_text_keys(children, keys),
            Inline::LineBreak { .. } => {}
        }
    }
}

fn same_block(a: &Block, b: &Block) -> bool {
    match (a, b) {
        (
            Block::Paragraph { align: aa, children: ac, .. },
            Block::Paragraph { align: ba, children: bc, .. },
        ) => aa == ba && same_inlines(ac, bc),
        (
            Block::Heading { level: al, children: ac, .. },
            Block::Heading { level: bl, children: bc, .. },
        ) => al == bl && same_inlines(ac, bc),
        (Block::Quote { children: ac, .. }, Block::Quote { children: bc, .. }) => {
            same_inlines(ac, bc)
        }
        (
            Block::List { list_type: at, items: ai, .. },
            Block::List { list_type: bt, items: bi, .. },
        ) => {
            at == bt
                && ai.len() == bi.len()
                && ai
                    .iter()
                    .zip(bi)
                    .all(|(x, y)| x.checked == y.checked && same_inlines(&x.children, &y.children))
        }
        (
            Block::Code { language: al, text: at, .. },
            Block::Code { language: bl, text: bt, .. },
        ) => al == bl && at == bt,
        (Block::Table { rows: ar, .. }, Block::Table { rows: br, .. }) => {
            ar.len() == br.len()
                && ar.iter().zip(br).all(|(x, y)| {
                    x.cells.len() == y.cells.len()
                        && x.cells.iter().zip(&y.cells).all(|(c, d)| {
                            c.header == d.header && same_inlines(&c.children, &d.children)
                        })
                })
        }
        (Block::HorizontalRule { .. }, Block::HorizontalRule { .. }) => true,
        (
            Block::Custom { node_type: at, attrs: aa, .. },
            Block::Custom { node_type: bt, attrs: ba, .. },
        ) => at == bt && aa == ba,
        _ => false,
    }
}

fn same_inlines(a: &[Inline], b: &[Inline]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x, y) {
            (
                Inline::Text { text: xt, format: xf, .. },
                Inline::Text { text: yt, format: yf, .. },
            ) => xt == yt && xf == yf,
            (
                Inline::Link { url: xu, children: xc, .. },
                Inline::Link { url: yu, children: yc, .. },
            ) => xu == yu && same_inlines(xc, yc),
            (Inline::LineBreak { .. }, Inline::LineBreak { .. }) => true,
            _ => false,
        })
}
