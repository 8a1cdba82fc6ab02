//! Integration tests for building and tearing down compositions
//!
//! This tests:
//! - Collision policies for commands and node types
//! - Cleanup ordering, fail-fast registration, idempotent disposal
//! - Feature and context guards
//! - Active-state recomputation per change notification

use luthor_document::{Mutation, Selection};
use luthor_runtime::{
    Availability, BuildError, Category, Cleanup, CollisionPolicy, CommandDef, CommandError,
    Composition, ConfigurationError, EditorConfig, Extension, ExtensionContext, Lifecycle,
    NodeTypeSpec, Outcome, StateQuery, UiContribution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Default, Serialize, Deserialize)]
struct RecorderConfig {
    #[serde(default)]
    label: String,
}

struct Recorder {
    id: String,
    log: Log,
    commands: Vec<(&'static str, i64)>,
    node_types: Vec<NodeTypeSpec>,
    fail: bool,
    config: RecorderConfig,
}

impl Recorder {
    fn new(id: &str, log: &Log) -> Self {
        Self {
            id: id.to_string(),
            log: Arc::clone(log),
            commands: Vec::new(),
            node_types: Vec::new(),
            fail: false,
            config: RecorderConfig::default(),
        }
    }

    fn command(mut self, name: &'static str, value: i64) -> Self {
        self.commands.push((name, value));
        self
    }

    fn node_type(mut self, spec: NodeTypeSpec) -> Self {
        self.node_types.push(spec);
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Extension for Recorder {
    fn id(&self) -> &str {
        &self.id
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn configure(&mut self, partial: &Value) -> Result<(), ConfigurationError> {
        self.config = luthor_runtime::merge_config(&self.id, &self.config, partial)?;
        Ok(())
    }

    fn register(&self, _document: &luthor_document::DocumentHandle) -> anyhow::Result<Cleanup> {
        if self.fail {
            anyhow::bail!("extension {} refused to start", self.id);
        }
        self.log.lock().unwrap().push(format!("register:{}", self.id));
        let log = Arc::clone(&self.log);
        let id = self.id.clone();
        Ok(Cleanup::new(move || log.lock().unwrap().push(format!("cleanup:{}", id))))
    }

    fn commands(&self, _ctx: &ExtensionContext) -> Vec<CommandDef> {
        let label = self.config.label.clone();
        let mut commands: Vec<CommandDef> = self
            .commands
            .iter()
            .map(|(name, value)| {
                let value = *value;
                CommandDef::new(*name, move |_| Ok(Outcome::value(value)))
            })
            .collect();
        commands.push(CommandDef::new(format!("{}Label", self.id), move |_| {
            Ok(Outcome::value(label.clone()))
        }));
        commands
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        self.node_types.clone()
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![UiContribution::new(format!("{}-button", self.id), Category::Toolbar, &self.id)]
    }
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn test_later_extension_wins_command_collision() {
    let log = log();
    let composition = Composition::builder()
        .extension(Recorder::new("a", &log).command("x", 1))
        .extension(Recorder::new("b", &log).command("x", 2))
        .build()
        .unwrap();

    assert_eq!(composition.call("x", Value::Null).await.unwrap(), json!(2));
    assert_eq!(composition.command_owner("x"), Some("b"));
    assert_eq!(composition.overrides().len(), 1);
    assert_eq!(composition.overrides()[0].previous_owner, "a");
}

#[test]
fn test_reject_policy_fails_before_registering() {
    let log = log();
    let config = EditorConfig {
        command_collisions: CollisionPolicy::Reject,
        ..Default::default()
    };
    let result = Composition::builder()
        .config(config)
        .extension(Recorder::new("a", &log).command("x", 1))
        .extension(Recorder::new("b", &log).command("x", 2))
        .build();

    assert!(matches!(
        result,
        Err(BuildError::Configuration(ConfigurationError::NameCollision { .. }))
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_node_type_conflict_is_configuration_error() {
    let log = log();
    let result = Composition::builder()
        .extension(Recorder::new("a", &log).node_type(NodeTypeSpec::new("table")))
        .extension(Recorder::new("b", &log).node_type(NodeTypeSpec::new("table")))
        .build();

    assert!(matches!(
        result,
        Err(BuildError::Configuration(ConfigurationError::NodeTypeConflict { ref tag, .. })) if tag == "table"
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_duplicate_extension_id() {
    let log = log();
    let result = Composition::builder()
        .extension(Recorder::new("a", &log))
        .extension(Recorder::new("a", &log))
        .build();
    assert!(matches!(
        result,
        Err(BuildError::Configuration(ConfigurationError::DuplicateExtension(ref id))) if id == "a"
    ));
}

#[test]
fn test_failed_registration_unwinds_in_reverse() {
    let log = log();
    let result = Composition::builder()
        .extension(Recorder::new("a", &log))
        .extension(Recorder::new("b", &log))
        .extension(Recorder::new("c", &log).failing())
        .extension(Recorder::new("d", &log))
        .build();

    match result {
        Err(BuildError::Registration { id, .. }) => assert_eq!(id, "c"),
        other => panic!("unexpected build result: {:?}", other.map(|_| ())),
    }
    assert_eq!(
        *log.lock().unwrap(),
        vec!["register:a", "register:b", "cleanup:b", "cleanup:a"]
    );
}

#[test]
fn test_dispose_is_idempotent_and_reverse_ordered() {
    let log = log();
    let composition = Composition::builder()
        .extension(Recorder::new("a", &log))
        .extension(Recorder::new("b", &log))
        .build()
        .unwrap();
    assert_eq!(composition.lifecycle(), Lifecycle::Active);

    composition.dispose();
    composition.dispose();
    drop(composition);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["register:a", "register:b", "cleanup:b", "cleanup:a"]
    );
}

#[test]
fn test_commands_after_dispose_fail() {
    let log = log();
    let composition = Composition::builder()
        .extension(Recorder::new("a", &log).command("x", 1))
        .build()
        .unwrap();
    composition.dispose();

    assert_eq!(composition.lifecycle(), Lifecycle::Disposed);
    assert!(matches!(
        composition.execute("x", Value::Null),
        Err(CommandError::Disposed)
    ));
}

#[test]
fn test_unknown_command_is_typed_error() {
    let composition = Composition::builder().build().unwrap();
    assert!(matches!(
        composition.execute("missing", Value::Null),
        Err(CommandError::NotFound(ref name)) if name == "missing"
    ));
}

#[tokio::test]
async fn test_extension_configuration_is_applied() {
    let log = log();
    let config = EditorConfig::default().with_extension_config("a", json!({"label": "Hello"}));
    let composition = Composition::builder()
        .config(config)
        .extension(Recorder::new("a", &log))
        .build()
        .unwrap();

    assert_eq!(composition.call("aLabel", Value::Null).await.unwrap(), json!("Hello"));
}

#[test]
fn test_invalid_extension_configuration() {
    let log = log();
    let config = EditorConfig::default().with_extension_config("a", json!({"label": 5}));
    let result = Composition::builder()
        .config(config)
        .extension(Recorder::new("a", &log))
        .build();
    assert!(matches!(
        result,
        Err(BuildError::Configuration(ConfigurationError::InvalidExtensionConfig { .. }))
    ));
}

struct Formatting;

impl Extension for Formatting {
    fn id(&self) -> &str {
        "formatting"
    }

    fn register(&self, _document: &luthor_document::DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn commands(&self, _ctx: &ExtensionContext) -> Vec<CommandDef> {
        vec![CommandDef::new("toggleBold", |_| Ok(Outcome::value(true)))
            .feature("bold")
            .formatting()
            .fallback(json!(false))]
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![StateQuery::sync("blockCount", |state| json!(state.tree.children.len()))]
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("code").restricted()]
    }
}

#[tokio::test]
async fn test_feature_flags_swap_in_noops() {
    let composition = Composition::builder()
        .config(EditorConfig::default().with_feature("bold", false))
        .extension(Formatting)
        .build()
        .unwrap();

    assert_eq!(composition.command_availability("toggleBold"), Some(Availability::Disabled));
    assert_eq!(composition.call("toggleBold", Value::Null).await.unwrap(), json!(false));

    composition.set_feature_flags(Default::default());
    assert_eq!(composition.command_availability("toggleBold"), Some(Availability::Active));
    assert_eq!(composition.call("toggleBold", Value::Null).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_formatting_suppressed_inside_restricted_block() {
    let composition = Composition::builder().extension(Formatting).build().unwrap();
    let document = composition.document().clone();

    let code_key = document
        .update("insert", |ctx| {
            let block = ctx.factory().code(None, "let x = 1;");
            let key = block.key().to_string();
            ctx.apply(Mutation::InsertBlock { index: 0, block })?;
            Ok(key)
        })
        .unwrap();
    document.set_selection(Some(Selection::collapsed(code_key, 0)));

    assert_eq!(composition.command_availability("toggleBold"), Some(Availability::Suppressed));
    assert_eq!(composition.call("toggleBold", Value::Null).await.unwrap(), json!(false));

    let paragraph_key = document.read(|state| state.tree.children[1].key().to_string());
    document.set_selection(Some(Selection::collapsed(paragraph_key, 0)));
    assert_eq!(composition.call("toggleBold", Value::Null).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_active_state_recomputed_once_per_change_burst() {
    let composition = Composition::builder().extension(Formatting).build().unwrap();
    let document = composition.document().clone();

    let first = composition.active_states().await;
    assert_eq!(first["blockCount"], json!(1));
    composition.active_states().await;
    assert_eq!(composition.active_state_refreshes(), 1);

    for _ in 0..5 {
        document
            .update("insert", |ctx| {
                let block = ctx.factory().horizontal_rule();
                ctx.apply(Mutation::InsertBlock { index: 0, block })
            })
            .unwrap();
    }

    let latest = composition.active_states().await;
    composition.active_states().await;
    assert_eq!(latest["blockCount"], json!(6));
    assert_eq!(composition.active_state_refreshes(), 2);
}

#[test]
fn test_contributions_filtered_by_category() {
    let log = log();
    let composition = Composition::builder()
        .extension(Recorder::new("a", &log))
        .extension(Formatting)
        .build()
        .unwrap();

    let toolbar = composition.contributions(Category::Toolbar);
    assert_eq!(toolbar.len(), 1);
    assert_eq!(toolbar[0].id, "a-button");
    assert!(composition.contributions(Category::Floating).is_empty());
    assert_eq!(composition.extensions()[0].categories, vec![Category::Toolbar]);
}

#[test]
fn test_dispose_removes_document_listener() {
    let composition = Composition::builder().extension(Formatting).build().unwrap();
    let document = composition.document().clone();
    assert_eq!(document.lock().listener_count(), 1);
    composition.dispose();
    assert_eq!(document.lock().listener_count(), 0);
}
