//! # Extension Contract
//!
//! An extension declares an id and registration against the document.
//! Every other hook has an empty default so the aggregator calls them all
//! unconditionally.

use luthor_document::{DocumentHandle, ListenerId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::commands::CommandDef;
use crate::error::ConfigurationError;
use crate::node_types::{NodeTypeSpec, NodeTypeTable};
use crate::registry::BlockRegistry;
use crate::state::StateQuery;

/// UI placement hint. Never affects registration or aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Toolbar,
    Floating,
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiContribution {
    pub id: String,
    pub category: Category,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl UiContribution {
    pub fn new(id: impl Into<String>, category: Category, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            label: label.into(),
            command: None,
        }
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// Teardown returned by [`Extension::register`]. Runs at most once.
pub struct Cleanup(Option<Box<dyn FnOnce() + Send>>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    /// Cleanup that removes a document listener
    pub fn unsubscribe(document: &DocumentHandle, id: ListenerId) -> Self {
        let document = document.clone();
        Self::new(move || {
            document.unsubscribe(id);
        })
    }

    pub fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_some() { "Cleanup" } else { "Cleanup(noop)" })
    }
}

/// What an extension sees when declaring commands and state queries
#[derive(Clone)]
pub struct ExtensionContext {
    pub document: DocumentHandle,
    pub node_types: Arc<NodeTypeTable>,
}

impl ExtensionContext {
    pub fn block_registry(&self) -> BlockRegistry {
        BlockRegistry::from_node_types(&self.node_types)
    }
}

pub trait Extension: Send + Sync {
    fn id(&self) -> &str;

    fn categories(&self) -> &[Category] {
        &[]
    }

    /// Apply a partial configuration before registration
    fn configure(&mut self, partial: &Value) -> Result<(), ConfigurationError> {
        let _ = partial;
        Ok(())
    }

    fn register(&self, document: &DocumentHandle) -> anyhow::Result<Cleanup>;

    fn commands(&self, _ctx: &ExtensionContext) -> Vec<CommandDef> {
        Vec::new()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        Vec::new()
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        Vec::new()
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        Vec::new()
    }
}

/// JSON merge-patch: objects merge recursively, `null` removes the key,
/// anything else replaces
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Merge a partial configuration over a typed config. Keys reset with
/// `null` fall back to the field's serde default.
pub fn merge_config<T>(id: &str, current: &T, partial: &Value) -> Result<T, ConfigurationError>
where
    T: Serialize + DeserializeOwned,
{
    let invalid = |message: String| ConfigurationError::InvalidExtensionConfig {
        id: id.to_string(),
        message,
    };
    let mut merged = serde_json::to_value(current).map_err(|e| invalid(e.to_string()))?;
    merge_patch(&mut merged, partial);
    serde_json::from_value(merged).map_err(|e| invalid(e.to_string()))
}
