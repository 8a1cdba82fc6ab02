//! # Document
//!
//! Owns the current editor state and serializes every change through
//! [`Document::update`].
//!
//! ## Lifecycle
//!
//! ```text
//! update(tag, f) → clone state → f mutates clone → commit
//!                                   ↓ error          ↓
//!                               state untouched   history + version + listeners
//! ```
//!
//! States are immutable once committed and shared as `Arc<EditorState>`, so
//! readers keep a consistent view while later updates land.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::errors::DocumentError;
use crate::history::History;
use crate::keys::{IdGenerator, NodeFactory};
use crate::mutations::{Mutation, MutationError};
use crate::node::{NodeKey, Tree};
use crate::notify::{self, Notification, SharedListener};
use crate::selection::Selection;

/// Update tags with special meaning
pub mod tags {
    /// Selection-only change. Not recorded in history.
    pub const SELECTION: &str = "selection";
    /// Undo/redo restoring a recorded state. Not recorded in history.
    pub const HISTORY: &str = "history";
    /// Document content replaced by an import
    pub const IMPORT: &str = "import";
}

/// Immutable snapshot of document content and selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub tree: Tree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl EditorState {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            selection: None,
        }
    }

    /// Serializable snapshot of the content: `{"root": {"children": [...]}}`
    pub fn to_json(&self) -> Value {
        json!({ "root": self.tree })
    }

    pub fn from_json(value: &Value) -> Result<Self, DocumentError> {
        let root = value
            .get("root")
            .ok_or_else(|| DocumentError::InvalidSnapshot("missing root".to_string()))?;
        let tree: Tree = serde_json::from_value(root.clone())?;
        Ok(Self::new(tree))
    }

    /// Block containing the selection anchor
    pub fn anchor_block(&self) -> Option<&crate::node::Block> {
        let selection = self.selection.as_ref()?;
        self.tree.block(&selection.anchor.key)
    }
}

/// Notification delivered to listeners after each commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub tag: String,
    pub version: u64,
}

pub type Listener = Box<dyn FnMut(&ChangeEvent, &EditorState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Mutable view handed to update closures
pub struct UpdateContext<'a> {
    state: &'a mut EditorState,
    ids: &'a mut IdGenerator,
    tag: &'a str,
}

impl<'a> UpdateContext<'a> {
    pub fn tag(&self) -> &str {
        self.tag
    }

    pub fn tree(&self) -> &Tree {
        &self.state.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.state.tree
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.state.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
    }

    pub fn ids(&mut self) -> &mut IdGenerator {
        &mut *self.ids
    }

    pub fn factory(&mut self) -> NodeFactory<'_> {
        self.ids.factory()
    }

    pub fn apply(&mut self, mutation: Mutation) -> Result<(), MutationError> {
        mutation.apply(&mut self.state.tree)
    }

    /// Replace the whole tree. Keys already present are kept and the key
    /// generator skips past them.
    pub fn replace_tree(&mut self, tree: Tree) {
        for key in tree.keys() {
            self.ids.observe(&key);
        }
        self.state.tree = tree;
        self.state.selection = None;
    }

    /// Split a text node at a character offset, see [`Tree::split_text`]
    pub fn split_text(&mut self, key: &str, offset: usize) -> Option<NodeKey> {
        self.state.tree.split_text(key, offset, self.ids)
    }

    /// Text nodes covered by the current selection, split at its edges
    pub fn isolate_selection(&mut self) -> Vec<NodeKey> {
        let Some(selection) = self.state.selection.clone() else {
            return Vec::new();
        };
        self.state.tree.isolate_selection(&selection, self.ids)
    }

    pub fn state(&self) -> &EditorState {
        &*self.state
    }
}

/// Editable rich document
pub struct Document {
    state: Arc<EditorState>,
    version: u64,
    ids: IdGenerator,
    history: History,
    listeners: BTreeMap<ListenerId, SharedListener>,
    next_listener: u64,
    deferred: Option<Vec<Notification>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("version", &self.version)
            .field("blocks", &self.state.tree.children.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Document {
    /// Create a document holding a single empty paragraph
    pub fn new(namespace: &str) -> Self {
        let mut ids = IdGenerator::new(namespace);
        let tree = Tree::new(vec![ids.factory().paragraph(Vec::new())]);
        Self::from_parts(ids, tree)
    }

    pub fn with_tree(namespace: &str, tree: Tree) -> Self {
        let mut ids = IdGenerator::new(namespace);
        for key in tree.keys() {
            ids.observe(&key);
        }
        Self::from_parts(ids, tree)
    }

    fn from_parts(ids: IdGenerator, tree: Tree) -> Self {
        Self {
            state: Arc::new(EditorState::new(tree)),
            version: 0,
            ids,
            history: History::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            deferred: None,
        }
    }

    pub fn state(&self) -> Arc<EditorState> {
        Arc::clone(&self.state)
    }

    pub fn tree(&self) -> &Tree {
        &self.state.tree
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Run `f` against a copy of the current state and commit the result.
    ///
    /// If `f` fails nothing is committed and no listener runs.
    pub fn update<R, F>(&mut self, tag: &str, f: F) -> Result<R, DocumentError>
    where
        F: FnOnce(&mut UpdateContext<'_>) -> Result<R, MutationError>,
    {
        let mut next = (*self.state).clone();
        let result = {
            let mut ctx = UpdateContext {
                state: &mut next,
                ids: &mut self.ids,
                tag,
            };
            f(&mut ctx)
        };

        match result {
            Ok(value) => {
                self.commit(tag, next);
                Ok(value)
            }
            Err(source) => {
                tracing::debug!(tag, error = %source, "update rejected");
                Err(DocumentError::Update {
                    tag: tag.to_string(),
                    source,
                })
            }
        }
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        let mut next = (*self.state).clone();
        next.selection = selection;
        self.commit(tags::SELECTION, next);
    }

    fn commit(&mut self, tag: &str, next: EditorState) {
        let previous = std::mem::replace(&mut self.state, Arc::new(next));
        if tag != tags::SELECTION && tag != tags::HISTORY {
            self.history.record(previous);
        }
        self.version += 1;
        tracing::trace!(tag, version = self.version, "committed update");
        self.notify(tag);
    }

    fn notify(&mut self, tag: &str) {
        let notification = Notification {
            event: ChangeEvent {
                tag: tag.to_string(),
                version: self.version,
            },
            state: Arc::clone(&self.state),
            listeners: self.listeners.values().cloned().collect(),
        };
        match &mut self.deferred {
            Some(queue) => queue.push(notification),
            None => notify::deliver(vec![notification]),
        }
    }

    /// Queue notifications instead of delivering them inside the commit.
    /// The owner drains and delivers them once it releases the document.
    pub(crate) fn defer_notifications(&mut self) {
        self.deferred.get_or_insert_with(Vec::new);
    }

    pub(crate) fn take_notifications(&mut self) -> Vec<Notification> {
        self.deferred.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Register a listener called after every commit with the committed
    /// state. Through a [`DocumentHandle`](crate::DocumentHandle) listeners
    /// run after the lock is released and may use the handle again.
    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(id, Arc::new(Mutex::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn snapshot(&self) -> Value {
        self.state.to_json()
    }

    /// Replace content from a snapshot produced by [`Document::snapshot`]
    pub fn restore_snapshot(&mut self, tag: &str, snapshot: &Value) -> Result<(), DocumentError> {
        let restored = EditorState::from_json(snapshot)?;
        self.update(tag, move |ctx| {
            ctx.replace_tree(restored.tree);
            Ok(())
        })
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(Arc::clone(&self.state)) {
            Some(previous) => {
                self.state = previous;
                self.version += 1;
                self.notify(tags::HISTORY);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(Arc::clone(&self.state)) {
            Some(next) => {
                self.state = next;
                self.version += 1;
                self.notify(tags::HISTORY);
                true
            }
            None => false,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }
}
