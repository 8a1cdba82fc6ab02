//! # Document Handle
//!
//! Shared, thread-safe access to a [`Document`]. Extensions, commands and
//! codecs all hold clones of the same handle.
//!
//! Listeners are notified after the lock is released, so a listener may read
//! or update the document it observes.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::document::{Document, EditorState, Listener, ListenerId, UpdateContext};
use crate::errors::DocumentError;
use crate::mutations::MutationError;
use crate::notify;
use crate::selection::Selection;

#[derive(Clone)]
pub struct DocumentHandle {
    inner: Arc<Mutex<Document>>,
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Ok(document) => f.debug_tuple("DocumentHandle").field(&*document).finish(),
            Err(_) => f.debug_tuple("DocumentHandle").field(&"<locked>").finish(),
        }
    }
}

impl DocumentHandle {
    pub fn new(mut document: Document) -> Self {
        document.defer_notifications();
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    /// Lock the document. A poisoned lock is recovered since every commit
    /// swaps in a complete state. Commits made through the guard notify
    /// listeners when it drops.
    pub fn lock(&self) -> DocumentGuard<'_> {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        DocumentGuard { guard: Some(guard) }
    }

    pub fn state(&self) -> Arc<EditorState> {
        self.lock().state()
    }

    pub fn read<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        let state = self.state();
        f(&state)
    }

    pub fn update<R, F>(&self, tag: &str, f: F) -> Result<R, DocumentError>
    where
        F: FnOnce(&mut UpdateContext<'_>) -> Result<R, MutationError>,
    {
        self.lock().update(tag, f)
    }

    pub fn set_selection(&self, selection: Option<Selection>) {
        self.lock().set_selection(selection);
    }

    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        self.lock().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().unsubscribe(id)
    }

    pub fn version(&self) -> u64 {
        self.lock().version()
    }

    /// Whether two handles refer to the same document
    pub fn same_document(&self, other: &DocumentHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Exclusive access to a handle's document
pub struct DocumentGuard<'a> {
    guard: Option<MutexGuard<'a, Document>>,
}

impl Deref for DocumentGuard<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.guard.as_deref().unwrap_or_else(|| unreachable!("guard is only released on drop"))
    }
}

impl DerefMut for DocumentGuard<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.guard.as_deref_mut().unwrap_or_else(|| unreachable!("guard is only released on drop"))
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        let pending = match self.guard.take() {
            Some(mut guard) => guard.take_notifications(),
            None => return,
        };
        notify::deliver(pending);
    }
}

impl From<Document> for DocumentHandle {
    fn from(document: Document) -> Self {
        Self::new(document)
    }
}
