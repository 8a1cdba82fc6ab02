//! Node Type Table: which extension owns each node type tag.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::registry::BlockCodec;

#[derive(Clone)]
pub struct NodeTypeSpec {
    pub tag: String,
    /// Verbatim region where formatting commands are suppressed
    pub restricted: bool,
    pub codec: Option<Arc<dyn BlockCodec>>,
}

impl NodeTypeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            restricted: false,
            codec: None,
        }
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn BlockCodec>) -> Self {
        self.codec = Some(codec);
        self
    }
}

impl std::fmt::Debug for NodeTypeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeSpec")
            .field("tag", &self.tag)
            .field("restricted", &self.restricted)
            .field("codec", &self.codec.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NodeTypeEntry {
    pub owner: String,
    pub spec: NodeTypeSpec,
}

#[derive(Debug, Clone, Default)]
pub struct NodeTypeTable {
    entries: BTreeMap<String, NodeTypeEntry>,
}

impl NodeTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a tag for `owner`. Ownership is exclusive.
    pub fn insert(&mut self, owner: &str, spec: NodeTypeSpec) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.entries.get(&spec.tag) {
            return Err(ConfigurationError::NodeTypeConflict {
                tag: spec.tag.clone(),
                first: existing.owner.clone(),
                second: owner.to_string(),
            });
        }
        self.entries.insert(
            spec.tag.clone(),
            NodeTypeEntry {
                owner: owner.to_string(),
                spec,
            },
        );
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&NodeTypeEntry> {
        self.entries.get(tag)
    }

    pub fn owner(&self, tag: &str) -> Option<&str> {
        self.entries.get(tag).map(|entry| entry.owner.as_str())
    }

    pub fn is_restricted(&self, tag: &str) -> bool {
        self.entries.get(tag).map_or(false, |entry| entry.spec.restricted)
    }

    pub fn codecs(&self) -> impl Iterator<Item = Arc<dyn BlockCodec>> + '_ {
        self.entries
            .values()
            .filter_map(|entry| entry.spec.codec.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeTypeEntry)> {
        self.entries.iter().map(|(tag, entry)| (tag.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
