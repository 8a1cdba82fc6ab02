use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::commands::CollisionPolicy;
use crate::error::ConfigurationError;
use crate::guard::FeatureFlags;

pub const DEFAULT_CONFIG_NAME: &str = "luthor.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Feature switches fed to the guard layer
    #[serde(default)]
    pub feature_flags: FeatureFlags,

    #[serde(default)]
    pub command_collisions: CollisionPolicy,

    /// Partial configuration per extension id
    #[serde(default)]
    pub extensions: BTreeMap<String, Value>,
}

impl EditorConfig {
    /// Load config from a directory
    pub fn load(dir: &Path) -> Result<Self, ConfigurationError> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn with_feature(mut self, feature: impl Into<String>, enabled: bool) -> Self {
        self.feature_flags.insert(feature.into(), enabled);
        self
    }

    pub fn with_extension_config(mut self, id: impl Into<String>, partial: Value) -> Self {
        self.extensions.insert(id.into(), partial);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "featureFlags": { "bold": false },
            "commandCollisions": "reject",
            "extensions": { "table": { "rows": 4 } }
        }"#;

        let config = EditorConfig::parse(json).unwrap();
        assert_eq!(config.feature_flags.get("bold"), Some(&false));
        assert_eq!(config.command_collisions, CollisionPolicy::Reject);
        assert_eq!(config.extensions["table"], json!({"rows": 4}));
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert!(config.feature_flags.is_empty());
        assert_eq!(config.command_collisions, CollisionPolicy::LastWins);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{"featureFlags": {"history": false}}"#,
        )
        .unwrap();
        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config.feature_flags.get("history"), Some(&false));
    }
}
