//! Selection helpers shared by the extensions

use luthor_document::{
    Block, EditorState, Inline, NodeKey, NodeRef, Point, Selection, TextFormat, Tree,
    UpdateContext,
};
use std::ops::RangeInclusive;

/// Text and format of a text node
pub fn text_at<'a>(tree: &'a Tree, key: &str) -> Option<(&'a str, TextFormat)> {
    match tree.find(key) {
        Some(NodeRef::Inline(Inline::Text { text, format, .. })) => Some((text.as_str(), *format)),
        _ => None,
    }
}

fn text_len(tree: &Tree, key: &str) -> usize {
    text_at(tree, key).map_or(0, |(text, _)| text.chars().count())
}

/// Text nodes the selection touches, without splitting anything.
///
/// Edge nodes count only when at least one of their characters is covered.
/// A collapsed selection covers the node it sits in.
pub fn covered_text_keys(tree: &Tree, selection: &Selection) -> Vec<NodeKey> {
    let order = tree.text_keys();
    let anchor = order.iter().position(|key| *key == selection.anchor.key);
    let focus = order.iter().position(|key| *key == selection.focus.key);

    let (Some(anchor), Some(focus)) = (anchor, focus) else {
        let Some(range) = tree.selected_blocks(selection) else {
            return Vec::new();
        };
        return order
            .into_iter()
            .filter(|key| tree.block_index(key).map_or(false, |index| range.contains(&index)))
            .collect();
    };

    if selection.is_collapsed() {
        return vec![order[anchor].clone()];
    }

    let a = (anchor, selection.anchor.offset);
    let f = (focus, selection.focus.offset);
    let ((start, start_offset), (end, end_offset)) = if a <= f { (a, f) } else { (f, a) };

    if start == end {
        return if start_offset < end_offset {
            vec![order[start].clone()]
        } else {
            Vec::new()
        };
    }

    (start..=end)
        .filter(|&index| {
            if index == start {
                start_offset < text_len(tree, &order[index])
            } else if index == end {
                end_offset > 0
            } else {
                true
            }
        })
        .map(|index| order[index].clone())
        .collect()
}

/// Format shared by every covered text node
pub fn selection_format(state: &EditorState) -> Option<TextFormat> {
    let selection = state.selection.as_ref()?;
    let keys = covered_text_keys(&state.tree, selection);
    let mut formats = keys.iter().filter_map(|key| text_at(&state.tree, key).map(|(_, f)| f));
    let first = formats.next()?;
    Some(formats.fold(first, |shared, format| TextFormat::from_bits(shared.bits() & format.bits())))
}

pub fn has_format(state: &EditorState, format: TextFormat) -> bool {
    selection_format(state).map_or(false, |shared| shared.contains(format))
}

/// Top-level blocks touched by the selection
pub fn selected_range(state: &EditorState) -> Option<RangeInclusive<usize>> {
    let selection = state.selection.as_ref()?;
    state.tree.selected_blocks(selection)
}

pub fn has_range_selection(state: &EditorState) -> bool {
    state.selection.as_ref().map_or(false, |selection| !selection.is_collapsed())
}

/// Split covered text nodes at the selection edges and reselect exactly
/// the covered nodes
pub fn isolate_and_reselect(ctx: &mut UpdateContext<'_>) -> Vec<NodeKey> {
    let keys = ctx.isolate_selection();
    if let (Some(first), Some(last)) = (keys.first(), keys.last()) {
        let end = text_len(ctx.tree(), last);
        ctx.set_selection(Some(Selection::range(
            Point::new(first.clone(), 0),
            Point::new(last.clone(), end),
        )));
    }
    keys
}

/// Collapsed selection at the first text position of a block
pub fn start_of_block(block: &Block) -> Selection {
    let mut keys = Vec::new();
    if let Block::List { items, .. } = block {
        if let Some(item) = items.first() {
            first_text(&item.children, &mut keys);
            if keys.is_empty() {
                return Selection::collapsed(item.key.clone(), 0);
            }
        }
    } else if let Some(inlines) = block.inlines() {
        first_text(inlines, &mut keys);
    }
    match keys.into_iter().next() {
        Some(key) => Selection::collapsed(key, 0),
        None => Selection::collapsed(block.key().to_string(), 0),
    }
}

fn first_text(inlines: &[Inline], keys: &mut Vec<NodeKey>) {
    for inline in inlines {
        match inline {
            Inline::Text { key, .. } => {
                keys.push(key.clone());
                return;
            }
            Inline::Link { children, .. } => {
                first_text(children, keys);
                if !keys.is_empty() {
                    return;
                }
            }
            Inline::LineBreak { .. } => {}
        }
    }
}

/// Whether `key` names one of `inlines` or a node nested in them
pub fn inlines_contain(inlines: &[Inline], key: &str) -> bool {
    inlines.iter().any(|inline| {
        inline.key() == key
            || matches!(inline, Inline::Link { children, .. } if inlines_contain(children, key))
    })
}

/// Index after the block holding the selection anchor, or the end of the
/// document without a selection
pub fn insertion_index(state: &EditorState) -> usize {
    state
        .selection
        .as_ref()
        .and_then(|selection| state.tree.block_index(&selection.anchor.key))
        .map_or(state.tree.children.len(), |index| index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::IdGenerator;

    fn tree(ids: &mut IdGenerator, paragraphs: &[&str]) -> Tree {
        let mut factory = ids.factory();
        Tree::new(paragraphs.iter().map(|text| factory.paragraph_text(text)).collect())
    }

    #[test]
    fn test_covered_keys_skip_untouched_edges() {
        let mut ids = IdGenerator::from_seed("t");
        let tree = tree(&mut ids, &["abc", "def", "ghi"]);
        let keys = tree.text_keys();

        let selection = Selection::range(Point::new(keys[0].clone(), 3), Point::new(keys[2].clone(), 0));
        assert_eq!(covered_text_keys(&tree, &selection), vec![keys[1].clone()]);

        let selection = Selection::range(Point::new(keys[2].clone(), 1), Point::new(keys[0].clone(), 1));
        assert_eq!(covered_text_keys(&tree, &selection), keys);
    }

    #[test]
    fn test_selection_format_is_shared_subset() {
        let mut ids = IdGenerator::from_seed("t");
        let mut factory = ids.factory();
        let bold = factory.formatted("a", TextFormat::BOLD | TextFormat::ITALIC);
        let italic = factory.formatted("b", TextFormat::ITALIC);
        let keys = vec![bold.key().to_string(), italic.key().to_string()];
        let paragraph = factory.paragraph(vec![bold, italic]);
        let mut state = EditorState::new(Tree::new(vec![paragraph]));
        state.selection = Some(Selection::range(
            Point::new(keys[0].clone(), 0),
            Point::new(keys[1].clone(), 1),
        ));

        assert!(has_format(&state, TextFormat::ITALIC));
        assert!(!has_format(&state, TextFormat::BOLD));
    }

    #[test]
    fn test_start_of_empty_block_uses_block_key() {
        let mut ids = IdGenerator::from_seed("t");
        let block = ids.factory().paragraph(Vec::new());
        let selection = start_of_block(&block);
        assert_eq!(selection.anchor.key, block.key());
    }
}
