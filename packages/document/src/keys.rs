use crc32fast::Hasher;

use crate::node::{Block, Inline, ListItem, ListType, NodeKey, TableCell, TableRow, TextFormat};
use serde_json::{Map, Value};

/// Derive a document seed from a namespace using CRC32
pub fn get_document_seed(namespace: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(namespace.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential key generator for document nodes
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u32,
}

impl IdGenerator {
    pub fn new(namespace: &str) -> Self {
        Self {
            seed: get_document_seed(namespace),
            count: 0,
        }
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Generate next sequential key
    pub fn new_id(&mut self) -> NodeKey {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Advance the counter past a key issued by an earlier session so that
    /// restored documents never collide with freshly generated keys.
    pub fn observe(&mut self, key: &str) {
        let Some((seed, count)) = key.rsplit_once('-') else {
            return;
        };
        if seed != self.seed {
            return;
        }
        if let Ok(count) = count.parse::<u32>() {
            self.count = self.count.max(count);
        }
    }

    pub fn factory(&mut self) -> NodeFactory<'_> {
        NodeFactory { ids: self }
    }
}

/// Builds freshly keyed nodes
pub struct NodeFactory<'a> {
    ids: &'a mut IdGenerator,
}

impl<'a> NodeFactory<'a> {
    pub fn key(&mut self) -> NodeKey {
        self.ids.new_id()
    }

    pub fn text(&mut self, text: impl Into<String>) -> Inline {
        self.formatted(text, TextFormat::empty())
    }

    pub fn formatted(&mut self, text: impl Into<String>, format: TextFormat) -> Inline {
        Inline::Text {
            key: self.key(),
            text: text.into(),
            format,
        }
    }

    pub fn link(&mut self, url: impl Into<String>, children: Vec<Inline>) -> Inline {
        Inline::Link {
            key: self.key(),
            url: url.into(),
            rel: None,
            target: None,
            children,
        }
    }

    pub fn line_break(&mut self) -> Inline {
        Inline::LineBreak { key: self.key() }
    }

    pub fn paragraph(&mut self, children: Vec<Inline>) -> Block {
        Block::Paragraph {
            key: self.key(),
            align: None,
            children,
        }
    }

    pub fn paragraph_text(&mut self, text: &str) -> Block {
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![self.text(text)]
        };
        self.paragraph(children)
    }

    pub fn heading(&mut self, level: u8, children: Vec<Inline>) -> Block {
        Block::Heading {
            key: self.key(),
            level: level.clamp(1, 6),
            children,
        }
    }

    pub fn quote(&mut self, children: Vec<Inline>) -> Block {
        Block::Quote {
            key: self.key(),
            children,
        }
    }

    pub fn list_item(&mut self, children: Vec<Inline>) -> ListItem {
        ListItem {
            key: self.key(),
            checked: None,
            children,
        }
    }

    pub fn list(&mut self, list_type: ListType, items: Vec<ListItem>) -> Block {
        Block::List {
            key: self.key(),
            list_type,
            items,
        }
    }

    pub fn code(&mut self, language: Option<String>, text: impl Into<String>) -> Block {
        Block::Code {
            key: self.key(),
            language,
            theme: None,
            text: text.into(),
        }
    }

    pub fn table_cell(&mut self, header: bool, children: Vec<Inline>) -> TableCell {
        TableCell {
            key: self.key(),
            header,
            children,
        }
    }

    pub fn table_row(&mut self, cells: Vec<TableCell>) -> TableRow {
        TableRow {
            key: self.key(),
            cells,
        }
    }

    pub fn table(&mut self, rows: Vec<TableRow>) -> Block {
        Block::Table {
            key: self.key(),
            rows,
        }
    }

    pub fn horizontal_rule(&mut self) -> Block {
        Block::HorizontalRule { key: self.key() }
    }

    pub fn custom(&mut self, node_type: impl Into<String>, attrs: Map<String, Value>) -> Block {
        Block::Custom {
            key: self.key(),
            node_type: node_type.into(),
            attrs,
        }
    }
}
