//! # State Queries
//!
//! Read-only, possibly asynchronous getters reporting facets of the current
//! document and selection. The active-state cache evaluates all of them
//! concurrently against one committed state and reuses the result until the
//! document reports another change, so bursts of edits cost one pass.

use futures::future::{join_all, BoxFuture, FutureExt};
use luthor_document::{DocumentHandle, EditorState};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::commands::NamedTable;

pub type StateQueryFn = Arc<dyn Fn(Arc<EditorState>) -> BoxFuture<'static, Value> + Send + Sync>;

#[derive(Clone)]
pub struct StateQuery {
    pub name: String,
    pub query: StateQueryFn,
}

impl StateQuery {
    pub fn new<F>(name: impl Into<String>, query: F) -> Self
    where
        F: Fn(Arc<EditorState>) -> BoxFuture<'static, Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            query: Arc::new(query),
        }
    }

    /// Query answered synchronously from the state
    pub fn sync<F>(name: impl Into<String>, query: F) -> Self
    where
        F: Fn(&EditorState) -> Value + Send + Sync + 'static,
    {
        Self::new(name, move |state| {
            let value = query(&state);
            futures::future::ready(value).boxed()
        })
    }

    pub fn evaluate(&self, state: Arc<EditorState>) -> BoxFuture<'static, Value> {
        (self.query)(state)
    }
}

impl std::fmt::Debug for StateQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateQuery").field("name", &self.name).finish()
    }
}

pub type StateQueryTable = NamedTable<StateQuery>;

pub type ActiveState = BTreeMap<String, Value>;

/// Change counter shared with a document listener
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

pub struct ActiveStateCache {
    queries: Vec<StateQuery>,
    generation: Generation,
    cached: Mutex<Option<(u64, Arc<ActiveState>)>>,
    refreshes: AtomicU64,
}

impl ActiveStateCache {
    pub fn new(table: &StateQueryTable) -> Self {
        Self {
            queries: table.iter().map(|(_, owned)| owned.item.clone()).collect(),
            generation: Generation::default(),
            cached: Mutex::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation.clone()
    }

    pub fn invalidate(&self) {
        self.generation.bump();
    }

    /// Number of full recomputations so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }

    /// Current active state, recomputed only if the document changed since
    /// the last computation
    pub async fn get(&self, document: &DocumentHandle) -> Arc<ActiveState> {
        let generation = self.generation.current();
        if let Some(state) = self.cached_for(generation) {
            return state;
        }

        let snapshot = document.state();
        let pending = self.queries.iter().map(|query| {
            let name = query.name.clone();
            let future = query.evaluate(Arc::clone(&snapshot));
            async move { (name, future.await) }
        });
        let computed: Arc<ActiveState> = Arc::new(join_all(pending).await.into_iter().collect());

        self.refreshes.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(generation, queries = self.queries.len(), "recomputed active state");

        // Stored under the generation read before evaluating, so a change
        // that landed meanwhile forces the next call to recompute.
        *self.lock_cache() = Some((generation, Arc::clone(&computed)));
        computed
    }

    fn cached_for(&self, generation: u64) -> Option<Arc<ActiveState>> {
        match &*self.lock_cache() {
            Some((cached, state)) if *cached == generation => Some(Arc::clone(state)),
            _ => None,
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<(u64, Arc<ActiveState>)>> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CollisionPolicy;
    use luthor_document::Document;
    use serde_json::json;

    fn table() -> StateQueryTable {
        let mut table = StateQueryTable::new("state query");
        table
            .insert(
                "test",
                "blockCount",
                StateQuery::sync("blockCount", |state| json!(state.tree.children.len())),
                CollisionPolicy::LastWins,
            )
            .unwrap();
        table
            .insert(
                "test",
                "slow",
                StateQuery::new("slow", |_| {
                    async {
                        tokio::task::yield_now().await;
                        json!(true)
                    }
                    .boxed()
                }),
                CollisionPolicy::LastWins,
            )
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_cache_reused_until_generation_changes() {
        let document = DocumentHandle::new(Document::new("state"));
        let cache = ActiveStateCache::new(&table());

        let first = cache.get(&document).await;
        let second = cache.get(&document).await;
        assert_eq!(first["blockCount"], json!(1));
        assert_eq!(first["slow"], json!(true));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.refresh_count(), 1);

        cache.invalidate();
        cache.invalidate();
        cache.get(&document).await;
        assert_eq!(cache.refresh_count(), 2);
    }
}
