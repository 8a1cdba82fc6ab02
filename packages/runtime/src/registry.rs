//! # Block Metadata Registry
//!
//! Serializer/reconstructor pairs for node types with no native text syntax.
//!
//! A node type must be registered before a document containing it is
//! exported, otherwise its payload is omitted from the output.
//! Reconstructors never fail: every optional field falls back to a default
//! so hand-edited payloads still produce a node.

use luthor_document::{Block, IdGenerator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::node_types::NodeTypeTable;

/// Serialized form of an extension-owned block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDirective {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub payload: Value,
}

pub trait BlockCodec: Send + Sync {
    fn node_type(&self) -> &str;

    /// Node attributes to directive payload
    fn serialize(&self, attrs: &Map<String, Value>) -> Value {
        Value::Object(attrs.clone())
    }

    /// Directive payload to node attributes, with defaults applied
    fn reconstruct(&self, payload: &Value) -> Map<String, Value>;

    /// Human-readable line emitted after the directive
    fn placeholder(&self, attrs: &Map<String, Value>) -> String;

    /// Markup for the hypertext channel
    fn render_html(&self, _attrs: &Map<String, Value>) -> Option<String> {
        None
    }
}

#[derive(Clone, Default)]
pub struct BlockRegistry {
    codecs: BTreeMap<String, Arc<dyn BlockCodec>>,
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the codecs declared by registered node types
    pub fn from_node_types(table: &NodeTypeTable) -> Self {
        let mut registry = Self::new();
        for codec in table.codecs() {
            registry.register(codec);
        }
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn BlockCodec>) {
        self.codecs.insert(codec.node_type().to_string(), codec);
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn BlockCodec>> {
        self.codecs.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.codecs.contains_key(node_type)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Directive and placeholder for a custom block, if its type is registered
    pub fn serialize_block(&self, block: &Block) -> Option<(BlockDirective, String)> {
        let Block::Custom { node_type, attrs, .. } = block else {
            return None;
        };
        let codec = self.codecs.get(node_type)?;
        let directive = BlockDirective {
            node_type: node_type.clone(),
            payload: codec.serialize(attrs),
        };
        Some((directive, codec.placeholder(attrs)))
    }

    /// Rebuild a custom block from a directive payload
    pub fn reconstruct(&self, directive: &BlockDirective, ids: &mut IdGenerator) -> Option<Block> {
        let codec = self.codecs.get(&directive.node_type)?;
        let attrs = codec.reconstruct(&directive.payload);
        Some(ids.factory().custom(directive.node_type.clone(), attrs))
    }

    pub fn render_html(&self, block: &Block) -> Option<String> {
        let Block::Custom { node_type, attrs, .. } = block else {
            return None;
        };
        self.codecs.get(node_type)?.render_html(attrs)
    }
}

/// Field readers that tolerate missing or mistyped payload values
pub mod fields {
    use serde_json::Value;

    pub fn string_or(payload: &Value, key: &str, default: &str) -> String {
        match payload.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => value.clone(),
            _ => default.to_string(),
        }
    }

    pub fn optional_string(payload: &Value, key: &str) -> Option<String> {
        match payload.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.clone()),
            _ => None,
        }
    }

    /// Accepts numbers and numeric strings. Negative and non-finite values
    /// fall back to the default.
    pub fn number_or(payload: &Value, key: &str, default: u64) -> u64 {
        optional_number(payload, key).unwrap_or(default)
    }

    pub fn optional_number(payload: &Value, key: &str) -> Option<u64> {
        let value = payload.get(key)?;
        let number = match value {
            Value::Number(number) => number.as_f64()?,
            Value::String(text) => text.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if number.is_finite() && number >= 0.0 {
            Some(number.round() as u64)
        } else {
            None
        }
    }

    /// Value restricted to a fixed set, case-insensitive
    pub fn one_of(payload: &Value, key: &str, allowed: &[&str], default: &str) -> String {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| allowed.contains(&value.as_str()))
            .unwrap_or_else(|| default.to_string())
    }
}
