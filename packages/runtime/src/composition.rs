//! # Composition
//!
//! Registers an ordered extension list against one document and exposes the
//! aggregated command and state surface.
//!
//! ## Build
//!
//! ```text
//! configure → validate ids → claim node types → merge commands/queries
//!     → register each extension (collect cleanups) → Active
//! ```
//!
//! Every configuration problem is reported before any extension registers.
//! A failing `register` aborts the build after running the cleanups already
//! collected, newest first.
//!
//! ## Lifecycle
//!
//! `Uninitialized → Registering → Active → Disposing → Disposed`. Disposal
//! runs every cleanup exactly once in reverse registration order; calling
//! it again does nothing.

use luthor_document::{Document, DocumentHandle, ListenerId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::commands::{CommandTable, Outcome, Override};
use crate::config::EditorConfig;
use crate::error::{BuildError, CommandError, ConfigurationError};
use crate::extension::{Category, Cleanup, Extension, ExtensionContext, UiContribution};
use crate::guard::{Availability, ContextGuard, FeatureFlags, FeatureGuard, GuardedCommand};
use crate::node_types::NodeTypeTable;
use crate::registry::BlockRegistry;
use crate::state::{ActiveState, ActiveStateCache, StateQueryTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Uninitialized,
    Registering,
    Active,
    Disposing,
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionInfo {
    pub id: String,
    pub categories: Vec<Category>,
}

pub struct CompositionBuilder {
    extensions: Vec<Box<dyn Extension>>,
    config: EditorConfig,
    document: Option<DocumentHandle>,
}

impl Default for CompositionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionBuilder {
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
            config: EditorConfig::default(),
            document: None,
        }
    }

    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn extensions(mut self, extensions: impl IntoIterator<Item = Box<dyn Extension>>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Compose over an existing document instead of a fresh one
    pub fn document(mut self, document: DocumentHandle) -> Self {
        self.document = Some(document);
        self
    }

    pub fn build(self) -> Result<Composition, BuildError> {
        let CompositionBuilder {
            mut extensions,
            config,
            document,
        } = self;
        let mut lifecycle = Lifecycle::Uninitialized;
        let document = document.unwrap_or_else(|| DocumentHandle::new(Document::new("luthor")));
        let policy = config.command_collisions;

        for extension in extensions.iter_mut() {
            if let Some(partial) = config.extensions.get(extension.id()) {
                extension.configure(partial)?;
            }
        }
        for id in config.extensions.keys() {
            if !extensions.iter().any(|extension| extension.id() == id) {
                tracing::warn!(extension = %id, "configuration for unknown extension ignored");
            }
        }

        let mut seen = HashSet::new();
        for extension in &extensions {
            if !seen.insert(extension.id().to_string()) {
                return Err(ConfigurationError::DuplicateExtension(extension.id().to_string()).into());
            }
        }

        let mut node_types = NodeTypeTable::new();
        for extension in &extensions {
            for spec in extension.node_types() {
                node_types.insert(extension.id(), spec)?;
            }
        }
        let node_types = Arc::new(node_types);
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Arc::clone(&node_types),
        };

        let mut commands = CommandTable::new("command");
        let mut queries = StateQueryTable::new("state query");
        let mut overrides = Vec::new();
        let mut contributions = Vec::new();
        for extension in &extensions {
            for command in extension.commands(&ctx) {
                let name = command.name.clone();
                overrides.extend(commands.insert(extension.id(), &name, command, policy)?);
            }
            for query in extension.state_queries(&ctx) {
                let name = query.name.clone();
                overrides.extend(queries.insert(extension.id(), &name, query, policy)?);
            }
            for contribution in extension.ui_contributions() {
                contributions.push((extension.id().to_string(), contribution));
            }
        }

        transition(&mut lifecycle, Lifecycle::Registering);
        let mut cleanups: Vec<(String, Cleanup)> = Vec::with_capacity(extensions.len());
        for extension in &extensions {
            let id = extension.id().to_string();
            tracing::debug!(extension = %id, "registering extension");
            match extension.register(&document) {
                Ok(cleanup) => {
                    tracing::debug!(extension = %id, "registered extension");
                    cleanups.push((id, cleanup));
                }
                Err(error) => {
                    tracing::error!(extension = %id, error = %error, "extension failed to register");
                    run_cleanups(cleanups);
                    return Err(BuildError::Registration {
                        id,
                        source: error.into(),
                    });
                }
            }
        }

        let active = ActiveStateCache::new(&queries);
        let generation = active.generation();
        let listener = document.subscribe(Box::new(move |_, _| generation.bump()));

        let flags = config.feature_flags.clone();
        let guarded = FeatureGuard::apply(&commands, &flags);
        transition(&mut lifecycle, Lifecycle::Active);
        tracing::info!(
            extensions = extensions.len(),
            commands = commands.len(),
            queries = queries.len(),
            node_types = node_types.len(),
            "composition active"
        );

        Ok(Composition {
            extensions: extensions
                .iter()
                .map(|extension| ExtensionInfo {
                    id: extension.id().to_string(),
                    categories: extension.categories().to_vec(),
                })
                .collect(),
            context_guard: ContextGuard::new(Arc::clone(&node_types)),
            document,
            node_types,
            commands,
            queries,
            guarded: RwLock::new(guarded),
            flags: RwLock::new(flags),
            active,
            contributions,
            overrides,
            lifecycle: Mutex::new(lifecycle),
            cleanups: Mutex::new(cleanups),
            listener,
        })
    }
}

fn transition(lifecycle: &mut Lifecycle, next: Lifecycle) {
    tracing::debug!(from = ?lifecycle, to = ?next, "composition lifecycle");
    *lifecycle = next;
}

fn run_cleanups(cleanups: Vec<(String, Cleanup)>) {
    for (id, cleanup) in cleanups.into_iter().rev() {
        tracing::debug!(extension = %id, "running cleanup");
        cleanup.run();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The aggregated runtime over one document
pub struct Composition {
    document: DocumentHandle,
    extensions: Vec<ExtensionInfo>,
    node_types: Arc<NodeTypeTable>,
    commands: CommandTable,
    queries: StateQueryTable,
    guarded: RwLock<BTreeMap<String, GuardedCommand>>,
    flags: RwLock<FeatureFlags>,
    context_guard: ContextGuard,
    active: ActiveStateCache,
    contributions: Vec<(String, UiContribution)>,
    overrides: Vec<Override>,
    lifecycle: Mutex<Lifecycle>,
    cleanups: Mutex<Vec<(String, Cleanup)>>,
    listener: ListenerId,
}

impl Composition {
    pub fn builder() -> CompositionBuilder {
        CompositionBuilder::new()
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    pub fn extensions(&self) -> &[ExtensionInfo] {
        &self.extensions
    }

    pub fn node_types(&self) -> &NodeTypeTable {
        &self.node_types
    }

    pub fn block_registry(&self) -> BlockRegistry {
        BlockRegistry::from_node_types(&self.node_types)
    }

    /// Entries replaced under the last-wins policy, in merge order
    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.names().map(str::to_string).collect()
    }

    pub fn command_owner(&self, name: &str) -> Option<&str> {
        self.commands.get(name).map(|owned| owned.owner.as_str())
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    pub fn state_query_names(&self) -> Vec<String> {
        self.queries.names().map(str::to_string).collect()
    }

    pub fn state_query_owner(&self, name: &str) -> Option<&str> {
        self.queries.get(name).map(|owned| owned.owner.as_str())
    }

    fn ensure_active(&self) -> Result<(), CommandError> {
        match self.lifecycle() {
            Lifecycle::Active => Ok(()),
            _ => Err(CommandError::Disposed),
        }
    }

    /// Invoke a command through the feature and context guards
    pub fn execute(&self, name: &str, args: Value) -> Result<Outcome, CommandError> {
        self.ensure_active()?;
        let command = self
            .guarded
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .map(|guarded| guarded.command.clone())
            .ok_or_else(|| CommandError::NotFound(name.to_string()))?;

        if command.formatting && self.context_guard.suppresses(&command, &self.document.state()) {
            tracing::debug!(command = name, "suppressed inside restricted region");
            return Ok(Outcome::Ready(command.fallback.clone()));
        }

        tracing::trace!(command = name, "executing command");
        command.invoke(args)
    }

    /// Invoke a command and wait for its result
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, CommandError> {
        self.execute(name, args)?.resolve().await
    }

    pub fn command_availability(&self, name: &str) -> Option<Availability> {
        let guarded = self.guarded.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = guarded.get(name)?;
        if !entry.enabled {
            return Some(Availability::Disabled);
        }
        if self.context_guard.suppresses(&entry.command, &self.document.state()) {
            return Some(Availability::Suppressed);
        }
        Some(Availability::Active)
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.flags
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rebuild the guarded command table for new flags
    pub fn set_feature_flags(&self, flags: FeatureFlags) {
        let guarded = FeatureGuard::apply(&self.commands, &flags);
        *self.guarded.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = guarded;
        *self.flags.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = flags;
    }

    /// Results of every state query against the current state
    pub async fn active_states(&self) -> Arc<ActiveState> {
        self.active.get(&self.document).await
    }

    /// Evaluate a single state query now, bypassing the cache
    pub async fn query(&self, name: &str) -> Option<Value> {
        let query = self.queries.get(name)?.item.clone();
        Some(query.evaluate(self.document.state()).await)
    }

    pub fn active_state_refreshes(&self) -> u64 {
        self.active.refresh_count()
    }

    pub fn contributions(&self, category: Category) -> Vec<&UiContribution> {
        self.contributions
            .iter()
            .filter(|(_, contribution)| contribution.category == category)
            .map(|(_, contribution)| contribution)
            .collect()
    }

    /// Tear down every extension. Idempotent.
    pub fn dispose(&self) {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match *lifecycle {
                Lifecycle::Disposing | Lifecycle::Disposed => return,
                _ => *lifecycle = Lifecycle::Disposing,
            }
        }

        self.document.unsubscribe(self.listener);
        let cleanups = std::mem::take(&mut *lock(&self.cleanups));
        run_cleanups(cleanups);

        *lock(&self.lifecycle) = Lifecycle::Disposed;
        tracing::debug!("composition disposed");
    }
}

impl Drop for Composition {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composition")
            .field("extensions", &self.extensions)
            .field("commands", &self.commands.len())
            .field("queries", &self.queries.len())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
