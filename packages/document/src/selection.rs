//! # Selection
//!
//! Anchor/focus points addressing text nodes by key and character offset.
//! Points that reference a block key are treated as covering the whole block.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::keys::IdGenerator;
use crate::node::{Inline, NodeKey, Tree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: impl Into<NodeKey>, offset: usize) -> Self {
        Self {
            key: key.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(key: impl Into<NodeKey>, offset: usize) -> Self {
        let point = Point::new(key, offset);
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

impl Tree {
    /// Top-level block indices touched by the selection
    pub fn selected_blocks(&self, selection: &Selection) -> Option<RangeInclusive<usize>> {
        let anchor = self.block_index(&selection.anchor.key)?;
        let focus = self.block_index(&selection.focus.key)?;
        Some(anchor.min(focus)..=anchor.max(focus))
    }

    /// Split a text node at a character offset.
    ///
    /// The original node keeps the text before `offset`. Returns the key of
    /// the node that starts at `offset`, or `None` when nothing follows it.
    pub fn split_text(&mut self, key: &str, offset: usize, ids: &mut IdGenerator) -> Option<NodeKey> {
        let (siblings, index) = self.inline_siblings_mut(key)?;
        let Inline::Text { text, format, .. } = &mut siblings[index] else {
            return None;
        };
        let length = text.chars().count();
        if offset == 0 {
            return Some(key.to_string());
        }
        if offset >= length {
            return None;
        }
        let byte = text
            .char_indices()
            .nth(offset)
            .map(|(byte, _)| byte)
            .unwrap_or(text.len());
        let tail = text.split_off(byte);
        let right = Inline::Text {
            key: ids.new_id(),
            text: tail,
            format: *format,
        };
        let right_key = right.key().to_string();
        siblings.insert(index + 1, right);
        Some(right_key)
    }

    /// Keys of the text nodes covered by the selection, splitting partially
    /// covered nodes at the selection edges.
    ///
    /// A collapsed selection covers the text node it sits in.
    pub fn isolate_selection(&mut self, selection: &Selection, ids: &mut IdGenerator) -> Vec<NodeKey> {
        let order = self.text_keys();
        let anchor = order.iter().position(|key| *key == selection.anchor.key);
        let focus = order.iter().position(|key| *key == selection.focus.key);

        let (Some(anchor), Some(focus)) = (anchor, focus) else {
            return self.texts_in_selected_blocks(selection);
        };

        if selection.is_collapsed() {
            return vec![order[anchor].clone()];
        }

        let a = (anchor, selection.anchor.offset);
        let f = (focus, selection.focus.offset);
        let ((start, start_offset), (end, end_offset)) = if a <= f { (a, f) } else { (f, a) };

        if start == end {
            let key = order[start].clone();
            self.split_text(&key, end_offset, ids);
            return self.split_text(&key, start_offset, ids).into_iter().collect();
        }

        let mut covered = Vec::new();
        if let Some(head) = self.split_text(&order[start], start_offset, ids) {
            covered.push(head);
        }
        covered.extend(order[start + 1..end].iter().cloned());
        if end_offset > 0 {
            self.split_text(&order[end], end_offset, ids);
            covered.push(order[end].clone());
        }
        covered
    }

    fn texts_in_selected_blocks(&self, selection: &Selection) -> Vec<NodeKey> {
        let Some(range) = self.selected_blocks(selection) else {
            return Vec::new();
        };
        let keys = self.text_keys();
        keys.into_iter()
            .filter(|key| self.block_index(key).map_or(false, |index| range.contains(&index)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Block, TextFormat};

    fn tree_with(ids: &mut IdGenerator, paragraphs: &[&str]) -> Tree {
        let mut factory = ids.factory();
        Tree::new(paragraphs.iter().map(|text| factory.paragraph_text(text)).collect())
    }

    fn texts(tree: &Tree) -> Vec<String> {
        tree.children
            .iter()
            .flat_map(|block| block.inlines().cloned().unwrap_or_default())
            .map(|inline| inline.text_content())
            .collect()
    }

    #[test]
    fn test_split_inside_single_node() {
        let mut ids = IdGenerator::from_seed("s");
        let mut tree = tree_with(&mut ids, &["Hello world"]);
        let key = tree.text_keys()[0].clone();

        let covered = tree.isolate_selection(
            &Selection::range(Point::new(key.clone(), 6), Point::new(key, 11)),
            &mut ids,
        );

        assert_eq!(covered.len(), 1);
        assert_eq!(texts(&tree), vec!["Hello ", "world"]);
    }

    #[test]
    fn test_backwards_selection_across_nodes() {
        let mut ids = IdGenerator::from_seed("s");
        let mut tree = tree_with(&mut ids, &["abc", "def"]);
        let keys = tree.text_keys();

        let covered = tree.isolate_selection(
            &Selection::range(Point::new(keys[1].clone(), 1), Point::new(keys[0].clone(), 2)),
            &mut ids,
        );

        assert_eq!(texts(&tree), vec!["ab", "c", "d", "ef"]);
        assert_eq!(covered.len(), 2);
        assert_eq!(covered[1], keys[1]);
    }

    #[test]
    fn test_collapsed_selection_covers_node() {
        let mut ids = IdGenerator::from_seed("s");
        let mut tree = tree_with(&mut ids, &["abc"]);
        let key = tree.text_keys()[0].clone();
        let covered = tree.isolate_selection(&Selection::collapsed(key.clone(), 1), &mut ids);
        assert_eq!(covered, vec![key]);
    }

    #[test]
    fn test_split_keeps_format() {
        let mut ids = IdGenerator::from_seed("s");
        let bold = ids.factory().formatted("bold", TextFormat::BOLD);
        let key = bold.key().to_string();
        let paragraph_key = ids.new_id();
        let mut tree = Tree::new(vec![Block::Paragraph {
            key: paragraph_key,
            align: None,
            children: vec![bold],
        }]);

        let right = tree.split_text(&key, 2, &mut ids).unwrap();
        match tree.find(&right) {
            Some(crate::NodeRef::Inline(Inline::Text { text, format, .. })) => {
                assert_eq!(text, "ld");
                assert!(format.contains(TextFormat::BOLD));
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_block_level_points() {
        let mut ids = IdGenerator::from_seed("s");
        let tree = tree_with(&mut ids, &["a", "b", "c"]);
        let first = tree.children[0].key().to_string();
        let last = tree.children[2].key().to_string();
        let selection = Selection::range(Point::new(last, 0), Point::new(first, 0));
        assert_eq!(tree.selected_blocks(&selection), Some(0..=2));
    }
}
