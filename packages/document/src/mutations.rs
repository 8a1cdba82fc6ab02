//! # Document Mutations
//!
//! Semantic operations on the document tree.
//!
//! ## Mutation Semantics
//!
//! ### InsertBlock / MoveBlock
//! - Indices past the end clamp to the end
//!
//! ### UpdateText
//! - Atomic replacement of a text node or code block body
//!
//! ### RemoveNode
//! - Removes the node and all descendants
//! - Works for blocks, list items, table rows and inline nodes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::node::{Alignment, Block, Inline, NodeKey, TextFormat, Tree};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Insert a top-level block at index
    InsertBlock { index: usize, block: Block },

    /// Replace a top-level block, keeping its position
    ReplaceBlock { node_id: NodeKey, block: Block },

    /// Move a top-level block to a new index
    MoveBlock { node_id: NodeKey, index: usize },

    /// Remove any node from the tree
    RemoveNode { node_id: NodeKey },

    /// Replace the text of a text node or code block
    UpdateText { node_id: NodeKey, content: String },

    /// Overwrite the format bitmask of a text node
    SetTextFormat { node_id: NodeKey, format: TextFormat },

    /// Set a named attribute on a node
    SetAttribute {
        node_id: NodeKey,
        name: String,
        value: Value,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Node is not text")]
    NotText,

    #[error("Invalid attribute {name} on {node_type}")]
    InvalidAttribute { node_type: String, name: String },

    #[error("Duplicate node key: {0}")]
    DuplicateKey(String),
}

impl Mutation {
    /// Apply mutation to the tree with validation
    pub fn apply(&self, tree: &mut Tree) -> Result<(), MutationError> {
        self.validate(tree)?;

        match self {
            Mutation::InsertBlock { index, block } => {
                let index = (*index).min(tree.children.len());
                tree.children.insert(index, block.clone());
                Ok(())
            }

            Mutation::ReplaceBlock { node_id, block } => {
                let slot = tree
                    .block_by_key_mut(node_id)
                    .ok_or_else(|| MutationError::NodeNotFound(node_id.clone()))?;
                *slot = block.clone();
                Ok(())
            }

            Mutation::MoveBlock { node_id, index } => {
                let from = tree
                    .children
                    .iter()
                    .position(|block| block.key() == node_id)
                    .ok_or_else(|| MutationError::NodeNotFound(node_id.clone()))?;
                let block = tree.children.remove(from);
                let index = (*index).min(tree.children.len());
                tree.children.insert(index, block);
                Ok(())
            }

            Mutation::RemoveNode { node_id } => Self::apply_remove(tree, node_id),

            Mutation::UpdateText { node_id, content } => {
                Self::apply_update_text(tree, node_id, content)
            }

            Mutation::SetTextFormat { node_id, format } => {
                match tree.inline_mut(node_id) {
                    Some(Inline::Text { format: current, .. }) => {
                        *current = *format;
                        Ok(())
                    }
                    Some(_) => Err(MutationError::NotText),
                    None => Err(MutationError::NodeNotFound(node_id.clone())),
                }
            }

            Mutation::SetAttribute { node_id, name, value } => {
                Self::apply_set_attribute(tree, node_id, name, value)
            }
        }
    }

    /// Validate mutation without applying
    pub fn validate(&self, tree: &Tree) -> Result<(), MutationError> {
        match self {
            Mutation::InsertBlock { block, .. } => {
                if tree.contains(block.key()) {
                    return Err(MutationError::DuplicateKey(block.key().to_string()));
                }
                Ok(())
            }

            Mutation::ReplaceBlock { node_id, block } => {
                if !tree.children.iter().any(|b| b.key() == node_id) {
                    return Err(MutationError::NodeNotFound(node_id.clone()));
                }
                if block.key() != node_id && tree.contains(block.key()) {
                    return Err(MutationError::DuplicateKey(block.key().to_string()));
                }
                Ok(())
            }

            Mutation::MoveBlock { node_id, .. } => {
                if !tree.children.iter().any(|b| b.key() == node_id) {
                    return Err(MutationError::InvalidStructure(format!(
                        "{} is not a top-level block",
                        node_id
                    )));
                }
                Ok(())
            }

            Mutation::RemoveNode { node_id }
            | Mutation::UpdateText { node_id, .. }
            | Mutation::SetTextFormat { node_id, .. }
            | Mutation::SetAttribute { node_id, .. } => {
                if !tree.contains(node_id) {
                    return Err(MutationError::NodeNotFound(node_id.clone()));
                }
                Ok(())
            }
        }
    }

    fn apply_remove(tree: &mut Tree, node_id: &str) -> Result<(), MutationError> {
        if let Some(index) = tree.children.iter().position(|b| b.key() == node_id) {
            tree.children.remove(index);
            return Ok(());
        }

        if let Some((siblings, index)) = tree.inline_siblings_mut(node_id) {
            siblings.remove(index);
            return Ok(());
        }

        for block in &mut tree.children {
            match block {
                Block::List { items, .. } => {
                    if let Some(index) = items.iter().position(|item| item.key == node_id) {
                        items.remove(index);
                        return Ok(());
                    }
                }
                Block::Table { rows, .. } => {
                    if let Some(index) = rows.iter().position(|row| row.key == node_id) {
                        rows.remove(index);
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        Err(MutationError::InvalidStructure(format!(
            "{} cannot be removed on its own",
            node_id
        )))
    }

    fn apply_update_text(tree: &mut Tree, node_id: &str, content: &str) -> Result<(), MutationError> {
        if let Some(Block::Code { text, .. }) = tree.block_by_key_mut(node_id) {
            *text = content.to_string();
            return Ok(());
        }

        match tree.inline_mut(node_id) {
            Some(Inline::Text { text, .. }) => {
                *text = content.to_string();
                Ok(())
            }
            _ => Err(MutationError::NotText),
        }
    }

    fn apply_set_attribute(
        tree: &mut Tree,
        node_id: &str,
        name: &str,
        value: &Value,
    ) -> Result<(), MutationError> {
        let invalid = |node_type: &str| MutationError::InvalidAttribute {
            node_type: node_type.to_string(),
            name: name.to_string(),
        };
        let optional_string = |value: &Value| value.as_str().map(str::to_string);

        if let Some(block) = tree.block_by_key_mut(node_id) {
            return match (block, name) {
                (Block::Custom { attrs, .. }, _) => {
                    if value.is_null() {
                        attrs.remove(name);
                    } else {
                        attrs.insert(name.to_string(), value.clone());
                    }
                    Ok(())
                }
                (Block::Code { language, .. }, "language") => {
                    *language = optional_string(value);
                    Ok(())
                }
                (Block::Code { theme, .. }, "theme") => {
                    *theme = optional_string(value);
                    Ok(())
                }
                (Block::Paragraph { align, .. }, "align") => {
                    *align = value.as_str().and_then(Alignment::parse);
                    Ok(())
                }
                (Block::Heading { level, .. }, "level") => {
                    let next = value.as_u64().ok_or_else(|| invalid("heading"))?;
                    *level = next.clamp(1, 6) as u8;
                    Ok(())
                }
                (block, _) => Err(invalid(block.node_type())),
            };
        }

        if let Some(item) = tree.list_item_mut(node_id) {
            return match name {
                "checked" => {
                    item.checked = value.as_bool();
                    Ok(())
                }
                _ => Err(invalid("list-item")),
            };
        }

        match tree.inline_mut(node_id) {
            Some(Inline::Link { url, rel, target, .. }) => match name {
                "url" => {
                    *url = value.as_str().ok_or_else(|| invalid("link"))?.to_string();
                    Ok(())
                }
                "rel" => {
                    *rel = optional_string(value);
                    Ok(())
                }
                "target" => {
                    *target = optional_string(value);
                    Ok(())
                }
                _ => Err(invalid("link")),
            },
            Some(_) => Err(invalid("text")),
            None => Err(MutationError::NodeNotFound(node_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::IdGenerator;
    use crate::node::ListType;
    use serde_json::json;

    fn sample() -> (Tree, IdGenerator) {
        let mut ids = IdGenerator::from_seed("m");
        let mut f = ids.factory();
        let first = f.paragraph_text("first");
        let code = f.code(None, "let x = 1;");
        let item = {
            let text = f.text("item");
            f.list_item(vec![text])
        };
        let list = f.list(ListType::Check, vec![item]);
        (Tree::new(vec![first, code, list]), ids)
    }

    #[test]
    fn test_insert_clamps_index() {
        let (mut tree, mut ids) = sample();
        let block = ids.factory().horizontal_rule();
        let key = block.key().to_string();

        Mutation::InsertBlock { index: 99, block }.apply(&mut tree).unwrap();

        assert_eq!(tree.children.last().map(|b| b.key()), Some(key.as_str()));
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let (mut tree, _) = sample();
        let block = tree.children[0].clone();
        let result = Mutation::InsertBlock { index: 0, block }.apply(&mut tree);
        assert!(matches!(result, Err(MutationError::DuplicateKey(_))));
    }

    #[test]
    fn test_move_block() {
        let (mut tree, _) = sample();
        let key = tree.children[2].key().to_string();
        Mutation::MoveBlock { node_id: key.clone(), index: 0 }
            .apply(&mut tree)
            .unwrap();
        assert_eq!(tree.children[0].key(), key);
    }

    #[test]
    fn test_update_code_text() {
        let (mut tree, _) = sample();
        let key = tree.children[1].key().to_string();
        Mutation::UpdateText { node_id: key, content: "fn main() {}".into() }
            .apply(&mut tree)
            .unwrap();
        assert_eq!(tree.children[1].text_content(), "fn main() {}");
    }

    #[test]
    fn test_remove_list_item() {
        let (mut tree, _) = sample();
        let Block::List { items, .. } = &tree.children[2] else {
            panic!("expected list");
        };
        let item_key = items[0].key.clone();
        Mutation::RemoveNode { node_id: item_key }.apply(&mut tree).unwrap();
        assert!(matches!(&tree.children[2], Block::List { items, .. } if items.is_empty()));
    }

    #[test]
    fn test_set_attribute_on_list_item_and_code() {
        let (mut tree, _) = sample();
        let code_key = tree.children[1].key().to_string();
        let Block::List { items, .. } = &tree.children[2] else {
            panic!("expected list");
        };
        let item_key = items[0].key.clone();

        Mutation::SetAttribute {
            node_id: item_key.clone(),
            name: "checked".into(),
            value: json!(true),
        }
        .apply(&mut tree)
        .unwrap();
        Mutation::SetAttribute {
            node_id: code_key,
            name: "language".into(),
            value: json!("rust"),
        }
        .apply(&mut tree)
        .unwrap();

        assert!(matches!(&tree.children[1], Block::Code { language: Some(l), .. } if l == "rust"));
        assert!(matches!(
            &tree.children[2],
            Block::List { items, .. } if items[0].checked == Some(true)
        ));
    }

    #[test]
    fn test_set_unknown_attribute_fails() {
        let (mut tree, _) = sample();
        let key = tree.children[0].key().to_string();
        let result = Mutation::SetAttribute {
            node_id: key,
            name: "src".into(),
            value: json!("x"),
        }
        .apply(&mut tree);
        assert!(matches!(result, Err(MutationError::InvalidAttribute { .. })));
    }

    #[test]
    fn test_missing_node() {
        let (mut tree, _) = sample();
        let result = Mutation::UpdateText {
            node_id: "nope".into(),
            content: String::new(),
        }
        .apply(&mut tree);
        assert_eq!(result, Err(MutationError::NodeNotFound("nope".into())));
    }
}
