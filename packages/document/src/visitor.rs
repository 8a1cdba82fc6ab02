use crate::keys::IdGenerator;
use crate::node::*;

/// Visitor pattern for traversing document nodes immutably
///
/// Default implementations walk the entire tree. Override specific
/// visit_* methods to act on nodes.
pub trait Visitor: Sized {
    fn visit_tree(&mut self, tree: &Tree) {
        walk_tree(self, tree);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_list_item(&mut self, item: &ListItem) {
        walk_inlines(self, &item.children);
    }

    fn visit_table_row(&mut self, row: &TableRow) {
        for cell in &row.cells {
            self.visit_table_cell(cell);
        }
    }

    fn visit_table_cell(&mut self, cell: &TableCell) {
        walk_inlines(self, &cell.children);
    }

    fn visit_inline(&mut self, inline: &Inline) {
        walk_inline(self, inline);
    }
}

/// Mutable visitor for rewriting nodes in place
pub trait VisitorMut: Sized {
    fn visit_tree_mut(&mut self, tree: &mut Tree) {
        walk_tree_mut(self, tree);
    }

    fn visit_block_mut(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
    }

    fn visit_list_item_mut(&mut self, item: &mut ListItem) {
        walk_inlines_mut(self, &mut item.children);
    }

    fn visit_table_row_mut(&mut self, row: &mut TableRow) {
        for cell in &mut row.cells {
            self.visit_table_cell_mut(cell);
        }
    }

    fn visit_table_cell_mut(&mut self, cell: &mut TableCell) {
        walk_inlines_mut(self, &mut cell.children);
    }

    fn visit_inline_mut(&mut self, inline: &mut Inline) {
        walk_inline_mut(self, inline);
    }
}

pub fn walk_tree<V: Visitor>(visitor: &mut V, tree: &Tree) {
    for block in &tree.children {
        visitor.visit_block(block);
    }
}

pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    match block {
        Block::Paragraph { children, .. }
        | Block::Heading { children, .. }
        | Block::Quote { children, .. } => walk_inlines(visitor, children),
        Block::List { items, .. } => {
            for item in items {
                visitor.visit_list_item(item);
            }
        }
        Block::Table { rows, .. } => {
            for row in rows {
                visitor.visit_table_row(row);
            }
        }
        Block::Code { .. } | Block::HorizontalRule { .. } | Block::Custom { .. } => {}
    }
}

pub fn walk_inlines<V: Visitor>(visitor: &mut V, inlines: &[Inline]) {
    for inline in inlines {
        visitor.visit_inline(inline);
    }
}

pub fn walk_inline<V: Visitor>(visitor: &mut V, inline: &Inline) {
    if let Inline::Link { children, .. } = inline {
        walk_inlines(visitor, children);
    }
}

pub fn walk_tree_mut<V: VisitorMut>(visitor: &mut V, tree: &mut Tree) {
    for block in &mut tree.children {
        visitor.visit_block_mut(block);
    }
}

pub fn walk_block_mut<V: VisitorMut>(visitor: &mut V, block: &mut Block) {
    match block {
        Block::Paragraph { children, .. }
        | Block::Heading { children, .. }
        | Block::Quote { children, .. } => walk_inlines_mut(visitor, children),
        Block::List { items, .. } => {
            for item in items {
                visitor.visit_list_item_mut(item);
            }
        }
        Block::Table { rows, .. } => {
            for row in rows {
                visitor.visit_table_row_mut(row);
            }
        }
        Block::Code { .. } | Block::HorizontalRule { .. } | Block::Custom { .. } => {}
    }
}

pub fn walk_inlines_mut<V: VisitorMut>(visitor: &mut V, inlines: &mut [Inline]) {
    for inline in inlines {
        visitor.visit_inline_mut(inline);
    }
}

pub fn walk_inline_mut<V: VisitorMut>(visitor: &mut V, inline: &mut Inline) {
    if let Inline::Link { children, .. } = inline {
        walk_inlines_mut(visitor, children);
    }
}

/// Collects every node key in document order
#[derive(Default)]
pub struct KeyCollector {
    pub keys: Vec<NodeKey>,
}

impl Visitor for KeyCollector {
    fn visit_block(&mut self, block: &Block) {
        self.keys.push(block.key().to_string());
        walk_block(self, block);
    }

    fn visit_list_item(&mut self, item: &ListItem) {
        self.keys.push(item.key.clone());
        walk_inlines(self, &item.children);
    }

    fn visit_table_row(&mut self, row: &TableRow) {
        self.keys.push(row.key.clone());
        for cell in &row.cells {
            self.visit_table_cell(cell);
        }
    }

    fn visit_table_cell(&mut self, cell: &TableCell) {
        self.keys.push(cell.key.clone());
        walk_inlines(self, &cell.children);
    }

    fn visit_inline(&mut self, inline: &Inline) {
        self.keys.push(inline.key().to_string());
        walk_inline(self, inline);
    }
}

/// Replaces every key with a fresh one
pub struct Rekeyer<'a> {
    pub ids: &'a mut IdGenerator,
}

impl VisitorMut for Rekeyer<'_> {
    fn visit_block_mut(&mut self, block: &mut Block) {
        let fresh = self.ids.new_id();
        match block {
            Block::Paragraph { key, .. }
            | Block::Heading { key, .. }
            | Block::Quote { key, .. }
            | Block::List { key, .. }
            | Block::Code { key, .. }
            | Block::Table { key, .. }
            | Block::HorizontalRule { key }
            | Block::Custom { key, .. } => *key = fresh,
        }
        walk_block_mut(self, block);
    }

    fn visit_list_item_mut(&mut self, item: &mut ListItem) {
        item.key = self.ids.new_id();
        walk_inlines_mut(self, &mut item.children);
    }

    fn visit_table_row_mut(&mut self, row: &mut TableRow) {
        row.key = self.ids.new_id();
        for cell in &mut row.cells {
            self.visit_table_cell_mut(cell);
        }
    }

    fn visit_table_cell_mut(&mut self, cell: &mut TableCell) {
        cell.key = self.ids.new_id();
        walk_inlines_mut(self, &mut cell.children);
    }

    fn visit_inline_mut(&mut self, inline: &mut Inline) {
        let fresh = self.ids.new_id();
        match inline {
            Inline::Text { key, .. } | Inline::Link { key, .. } | Inline::LineBreak { key } => {
                *key = fresh
            }
        }
        walk_inline_mut(self, inline);
    }
}

impl Tree {
    pub fn keys(&self) -> Vec<NodeKey> {
        let mut collector = KeyCollector::default();
        collector.visit_tree(self);
        collector.keys
    }

    pub fn rekey(&mut self, ids: &mut IdGenerator) {
        Rekeyer { ids }.visit_tree_mut(self);
    }
}
