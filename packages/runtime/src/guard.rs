//! # Guards
//!
//! Two layers over the raw command table:
//!
//! - The feature guard swaps commands whose feature flag is off for no-ops
//!   returning a neutral value. The owning extension is never consulted.
//! - The context guard suppresses the formatting set while the selection
//!   anchor sits inside a restricted node type (a code block, say).

use luthor_document::EditorState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::commands::{CommandDef, CommandTable};
use crate::node_types::NodeTypeTable;

pub type FeatureFlags = BTreeMap<String, bool>;

/// Absent features are enabled
pub fn is_enabled(flags: &FeatureFlags, feature: &str) -> bool {
    flags.get(feature).copied().unwrap_or(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Availability {
    Active,
    /// Feature flag is off
    Disabled,
    /// Formatting command while the selection is in a restricted region
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct GuardedCommand {
    pub owner: String,
    pub command: CommandDef,
    pub enabled: bool,
}

pub struct FeatureGuard;

impl FeatureGuard {
    /// Build the guarded table for a set of flags
    pub fn apply(table: &CommandTable, flags: &FeatureFlags) -> BTreeMap<String, GuardedCommand> {
        table
            .iter()
            .map(|(name, owned)| {
                let enabled = owned
                    .item
                    .feature
                    .as_deref()
                    .map_or(true, |feature| is_enabled(flags, feature));
                let command = if enabled {
                    owned.item.clone()
                } else {
                    tracing::debug!(command = name, "feature disabled, installing no-op");
                    owned.item.to_noop()
                };
                (
                    name.to_string(),
                    GuardedCommand {
                        owner: owned.owner.clone(),
                        command,
                        enabled,
                    },
                )
            })
            .collect()
    }
}

pub struct ContextGuard {
    node_types: Arc<NodeTypeTable>,
}

impl ContextGuard {
    pub fn new(node_types: Arc<NodeTypeTable>) -> Self {
        Self { node_types }
    }

    /// Whether the selection anchor is inside a restricted node type
    pub fn in_restricted_region(&self, state: &EditorState) -> bool {
        state
            .anchor_block()
            .map_or(false, |block| self.node_types.is_restricted(block.node_type()))
    }

    pub fn suppresses(&self, command: &CommandDef, state: &EditorState) -> bool {
        command.formatting && self.in_restricted_region(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CollisionPolicy, Outcome};
    use crate::node_types::NodeTypeSpec;
    use luthor_document::{IdGenerator, Selection, Tree};
    use serde_json::{json, Value};

    fn table() -> CommandTable {
        let mut table = CommandTable::new("command");
        let bold = CommandDef::new("toggleBold", |_| Ok(Outcome::value(true)))
            .feature("bold")
            .formatting()
            .fallback(json!(false));
        let undo = CommandDef::new("undo", |_| Ok(Outcome::value(true)));
        table.insert("textFormat", "toggleBold", bold, CollisionPolicy::LastWins).unwrap();
        table.insert("history", "undo", undo, CollisionPolicy::LastWins).unwrap();
        table
    }

    #[test]
    fn test_disabled_feature_becomes_noop() {
        let mut flags = FeatureFlags::new();
        flags.insert("bold".into(), false);
        let guarded = FeatureGuard::apply(&table(), &flags);

        let bold = &guarded["toggleBold"];
        assert!(!bold.enabled);
        assert!(matches!(bold.command.invoke(Value::Null), Ok(Outcome::Ready(v)) if v == json!(false)));
        assert!(guarded["undo"].enabled);
    }

    #[test]
    fn test_context_guard_only_in_restricted_blocks() {
        let mut node_types = NodeTypeTable::new();
        node_types.insert("code", NodeTypeSpec::new("code").restricted()).unwrap();
        let guard = ContextGuard::new(Arc::new(node_types));

        let mut ids = IdGenerator::from_seed("g");
        let mut f = ids.factory();
        let code = f.code(None, "x");
        let paragraph = f.paragraph_text("y");
        let code_key = code.key().to_string();
        let text_key = paragraph.inlines().unwrap()[0].key().to_string();

        let mut state = EditorState::new(Tree::new(vec![code, paragraph]));
        let table = table();
        let bold = &table.get("toggleBold").unwrap().item;
        let undo = &table.get("undo").unwrap().item;

        state.selection = Some(Selection::collapsed(code_key, 0));
        assert!(guard.suppresses(bold, &state));
        assert!(!guard.suppresses(undo, &state));

        state.selection = Some(Selection::collapsed(text_key, 0));
        assert!(!guard.suppresses(bold, &state));
    }
}
