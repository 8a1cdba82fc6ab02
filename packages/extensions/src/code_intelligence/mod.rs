//! # Code Intelligence
//!
//! Language labels and highlight themes for code blocks.
//!
//! ```text
//! commit ──▶ subscription ──▶ pending queue (unlabeled, non-empty, not attempted)
//!                                   │
//!            detectPendingCodeLanguages
//!                                   ▼
//!                         ProviderCache::detect ──▶ set language + theme
//!                                   │ nothing found
//!                                   ▼
//!                               attempted (never retried)
//! ```

pub mod languages;
pub mod provider;

use futures::future::FutureExt;
use luthor_document::{Block, DocumentError, DocumentHandle, EditorState, Mutation, NodeKey};
use luthor_runtime::{
    merge_config, parse_args, Category, Cleanup, CommandDef, CommandError, ConfigurationError,
    Extension, ExtensionContext, Outcome, StateQuery, UiContribution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::support::selected_range;
pub use languages::{
    language_family, normalize_language, theme_for, LanguageOptionError, LanguageOptions,
    OptionsMode, DEFAULT_LANGUAGE_OPTIONS, DEFAULT_THEME,
};
pub use provider::{HighlightProvider, KeywordProvider, ProviderCache, ProviderLoader};

const ID: &str = "codeIntelligence";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeIntelligenceConfig {
    #[serde(default)]
    pub language_options: LanguageOptions,
}

#[derive(Debug, Default)]
struct Detection {
    pending: BTreeSet<NodeKey>,
    attempted: BTreeSet<NodeKey>,
}

#[derive(Clone, Default)]
struct Tracker(Arc<Mutex<Detection>>);

impl Tracker {
    fn lock(&self) -> MutexGuard<'_, Detection> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue unlabeled code blocks and forget keys that left the document
    fn observe(&self, state: &EditorState) {
        let mut detection = self.lock();
        let present: BTreeSet<&str> = state.tree.children.iter().map(Block::key).collect();
        detection.pending.retain(|key| present.contains(key.as_str()));
        detection.attempted.retain(|key| present.contains(key.as_str()));
        for block in &state.tree.children {
            if let Block::Code {
                key,
                language: None,
                text,
                ..
            } = block
            {
                if !text.trim().is_empty() && !detection.attempted.contains(key) {
                    detection.pending.insert(key.clone());
                }
            }
        }
    }
}

pub struct CodeIntelligenceExtension {
    config: CodeIntelligenceConfig,
    options: Vec<String>,
    provider: Arc<ProviderCache>,
    tracker: Tracker,
}

impl Default for CodeIntelligenceExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodeIntelligenceExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIntelligenceExtension")
            .field("options", &self.options)
            .field("provider", &self.provider)
            .finish()
    }
}

impl CodeIntelligenceExtension {
    pub fn new() -> Self {
        Self::with_cache(ProviderCache::keyword())
    }

    pub fn with_provider(provider: Arc<dyn HighlightProvider>) -> Self {
        Self::with_cache(ProviderCache::explicit(provider))
    }

    pub fn with_loader(loader: ProviderLoader) -> Self {
        Self::with_cache(ProviderCache::loader(loader))
    }

    fn with_cache(cache: ProviderCache) -> Self {
        Self {
            config: CodeIntelligenceConfig::default(),
            options: DEFAULT_LANGUAGE_OPTIONS.iter().map(|l| l.to_string()).collect(),
            provider: Arc::new(cache),
            tracker: Tracker::default(),
        }
    }

    pub fn language_options(&self) -> &[String] {
        &self.options
    }
}

/// Code blocks inside the selected block range
fn selected_code_blocks(state: &EditorState) -> Vec<&Block> {
    let Some(range) = selected_range(state) else {
        return Vec::new();
    };
    state.tree.children[range]
        .iter()
        .filter(|block| matches!(block, Block::Code { .. }))
        .collect()
}

/// Label code blocks with `language` and its theme. Keys that are no longer
/// code blocks are skipped. Returns how many blocks changed.
pub fn set_language(
    document: &DocumentHandle,
    keys: &[NodeKey],
    language: Option<&str>,
) -> Result<usize, DocumentError> {
    let theme = theme_for(language);
    document.update("code-language", |ctx| {
        let targets: Vec<NodeKey> = keys
            .iter()
            .filter(|key| matches!(ctx.tree().block(key), Some(Block::Code { key: found, .. }) if found == *key))
            .cloned()
            .collect();
        for key in &targets {
            ctx.apply(Mutation::SetAttribute {
                node_id: key.clone(),
                name: "language".to_string(),
                value: json!(language),
            })?;
            ctx.apply(Mutation::SetAttribute {
                node_id: key.clone(),
                name: "theme".to_string(),
                value: json!(theme),
            })?;
        }
        Ok(targets.len())
    })
}

#[derive(Deserialize)]
struct LanguageArgs {
    language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detected {
    pub key: NodeKey,
    pub language: String,
}

impl Extension for CodeIntelligenceExtension {
    fn id(&self) -> &str {
        ID
    }

    fn categories(&self) -> &[Category] {
        &[Category::Floating]
    }

    fn configure(&mut self, partial: &Value) -> Result<(), ConfigurationError> {
        let config: CodeIntelligenceConfig = merge_config(ID, &self.config, partial)?;
        self.options = config.language_options.resolve().map_err(|e| {
            ConfigurationError::InvalidExtensionConfig {
                id: ID.to_string(),
                message: e.to_string(),
            }
        })?;
        self.config = config;
        Ok(())
    }

    fn register(&self, document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        // Seed from the current content; the listener sees later commits.
        self.tracker.observe(&document.state());
        let tracker = self.tracker.clone();
        let id = document.subscribe(Box::new(move |_event, state| tracker.observe(state)));
        Ok(Cleanup::unsubscribe(document, id))
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let mut commands = Vec::new();

        let document = ctx.document.clone();
        commands.push(CommandDef::new("setCodeLanguage", move |args| {
            let args: LanguageArgs = match args {
                Value::String(language) => LanguageArgs { language },
                args => parse_args("setCodeLanguage", args)?,
            };
            let language = normalize_language(&args.language);
            let keys: Vec<NodeKey> = document.read(|state| {
                selected_code_blocks(state).iter().map(|b| b.key().to_string()).collect()
            });
            if !keys.is_empty() {
                set_language(&document, &keys, language.as_deref())?;
            }
            Ok(Outcome::value(language))
        }));

        let document = ctx.document.clone();
        let provider = Arc::clone(&self.provider);
        let tracker = self.tracker.clone();
        let options = self.options.clone();
        commands.push(CommandDef::new("autoDetectCodeLanguage", move |_| {
            let target = document.read(|state| {
                selected_code_blocks(state).first().map(|block| {
                    (block.key().to_string(), block.text_content())
                })
            });
            let (document, provider, tracker, options) =
                (document.clone(), Arc::clone(&provider), tracker.clone(), options.clone());
            Ok(Outcome::Pending(
                async move {
                    let Some((key, text)) = target else {
                        return Ok(Value::Null);
                    };
                    let Some(language) = provider.detect(&text, &options).await else {
                        return Ok(Value::Null);
                    };
                    set_language(&document, std::slice::from_ref(&key), Some(&language))?;
                    tracker.lock().attempted.remove(&key);
                    Ok(json!(language))
                }
                .boxed(),
            ))
        }));

        let document = ctx.document.clone();
        commands.push(CommandDef::new("getCurrentCodeLanguage", move |_| {
            let language = document.read(|state| match selected_code_blocks(state).first() {
                Some(Block::Code { language, .. }) => language.clone(),
                _ => None,
            });
            Ok(Outcome::value(language))
        }));

        let options = self.options.clone();
        commands.push(CommandDef::new("getCodeLanguageOptions", move |_| {
            Ok(Outcome::value(options.clone()))
        }));

        let document = ctx.document.clone();
        let provider = Arc::clone(&self.provider);
        let tracker = self.tracker.clone();
        let options = self.options.clone();
        commands.push(CommandDef::new("detectPendingCodeLanguages", move |_| {
            let (document, provider, tracker, options) =
                (document.clone(), Arc::clone(&provider), tracker.clone(), options.clone());
            Ok(Outcome::Pending(
                async move {
                    let queued: Vec<NodeKey> = std::mem::take(&mut tracker.lock().pending).into_iter().collect();
                    let mut detected = Vec::new();
                    for key in queued {
                        let text = document.read(|state| match state.tree.block(&key) {
                            Some(Block::Code {
                                key: found,
                                language: None,
                                text,
                                ..
                            }) if *found == key => Some(text.clone()),
                            _ => None,
                        });
                        let Some(text) = text else {
                            continue;
                        };
                        match provider.detect(&text, &options).await {
                            Some(language) => {
                                set_language(&document, std::slice::from_ref(&key), Some(&language))?;
                                detected.push(Detected { key, language });
                            }
                            None => {
                                tracing::debug!(key = %key, "no language detected for code block");
                                tracker.lock().attempted.insert(key);
                            }
                        }
                    }
                    serde_json::to_value(detected).map_err(|e| {
                        CommandError::failed("detectPendingCodeLanguages", e.to_string())
                    })
                }
                .boxed(),
            ))
        }));

        commands
            .into_iter()
            .map(|command| command.feature("codeIntelligence"))
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("codeLanguage", |state| {
            match state.anchor_block() {
                Some(Block::Code { language, .. }) => json!(language),
                _ => Value::Null,
            }
        })]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![
            UiContribution::new("codeLanguage", Category::Floating, "Language").command("setCodeLanguage"),
            UiContribution::new("detectLanguage", Category::Floating, "Detect language")
                .command("autoDetectCodeLanguage"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Selection, Tree};

    fn document_with_code(texts: &[&str]) -> DocumentHandle {
        let mut document = Document::new("code-intel");
        let tree = {
            let mut factory = document.ids_mut().factory();
            Tree::new(texts.iter().map(|text| factory.code(None, *text)).collect())
        };
        document
            .update("setup", |ctx| {
                ctx.replace_tree(tree);
                Ok(())
            })
            .unwrap();
        DocumentHandle::new(document)
    }

    #[test]
    fn test_configure_replaces_options() {
        let mut extension = CodeIntelligenceExtension::new();
        extension
            .configure(&json!({"languageOptions": {"mode": "replace", "values": ["ts", "sql"]}}))
            .unwrap();
        assert_eq!(extension.language_options(), ["sql", "typescript"]);
    }

    #[test]
    fn test_configure_rejects_duplicate_replacements() {
        let mut extension = CodeIntelligenceExtension::new();
        let err = extension
            .configure(&json!({"languageOptions": {"mode": "replace", "values": ["js", "javascript"]}}))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidExtensionConfig { ref id, .. } if id == ID));
    }

    #[test]
    fn test_set_language_applies_theme() {
        let document = document_with_code(&["SELECT 1"]);
        let key = document.read(|state| state.tree.children[0].key().to_string());

        set_language(&document, &[key], Some("sql")).unwrap();

        document.read(|state| match &state.tree.children[0] {
            Block::Code { language, theme, .. } => {
                assert_eq!(language.as_deref(), Some("sql"));
                assert_eq!(theme.as_deref(), Some("lang-sql"));
            }
            other => panic!("expected code, got {:?}", other),
        });
    }

    #[test]
    fn test_tracker_queues_unlabeled_blocks_once() {
        let document = document_with_code(&["fn main() { let mut x = 1; }", "   "]);
        let tracker = Tracker::default();
        tracker.observe(&document.state());
        {
            let mut detection = tracker.lock();
            assert_eq!(detection.pending.len(), 1);
            let key = detection.pending.iter().next().cloned().unwrap();
            detection.pending.clear();
            detection.attempted.insert(key);
        }
        tracker.observe(&document.state());
        assert!(tracker.lock().pending.is_empty());
    }

    #[test]
    fn test_tracker_forgets_removed_blocks() {
        let document = document_with_code(&["x = 1", "y = 2"]);
        let tracker = Tracker::default();
        tracker.observe(&document.state());
        {
            let mut detection = tracker.lock();
            let keys: Vec<NodeKey> = std::mem::take(&mut detection.pending).into_iter().collect();
            detection.attempted.extend(keys);
        }
        assert_eq!(tracker.lock().attempted.len(), 2);

        let removed = document.read(|state| state.tree.children[0].key().to_string());
        document
            .update("remove", |ctx| {
                ctx.tree_mut().children.remove(0);
                Ok(())
            })
            .unwrap();
        tracker.observe(&document.state());

        let detection = tracker.lock();
        assert_eq!(detection.attempted.len(), 1);
        assert!(!detection.attempted.contains(&removed));
    }

    #[tokio::test]
    async fn test_detect_pending_labels_blocks() {
        let document = document_with_code(&["def greet():\n    print('hi')"]);
        let extension = CodeIntelligenceExtension::new();
        let cleanup = extension.register(&document).unwrap();
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Default::default(),
        };
        let commands = extension.commands(&ctx);
        let detect = commands
            .iter()
            .find(|command| command.name == "detectPendingCodeLanguages")
            .unwrap();

        let result = detect.invoke(Value::Null).unwrap().resolve().await.unwrap();
        assert_eq!(result[0]["language"], "python");
        document.read(|state| {
            assert!(matches!(&state.tree.children[0], Block::Code { language: Some(l), .. } if l == "python"));
        });

        let key = document.read(|state| state.tree.children[0].key().to_string());
        document.set_selection(Some(Selection::collapsed(key, 0)));
        let current = commands
            .iter()
            .find(|command| command.name == "getCurrentCodeLanguage")
            .unwrap();
        assert_eq!(current.invoke(Value::Null).unwrap().resolve().await.unwrap(), "python");
        cleanup.run();
    }
}
