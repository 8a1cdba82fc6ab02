//! # Undo/Redo History
//!
//! Tracks committed editor states and enables undo/redo.
//!
//! ## Design
//!
//! - Each commit records the state it replaced
//! - Undo restores the previous state and moves the current one to redo
//! - New commits clear the redo stack
//! - Batches group several commits into a single undo step

use std::sync::Arc;

use crate::document::EditorState;

#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Arc<EditorState>>,
    redo_stack: Vec<Arc<EditorState>>,
    max_levels: usize,
    batch: Option<BatchState>,
}

#[derive(Debug)]
struct BatchState {
    depth: usize,
    recorded: bool,
}

impl History {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            batch: None,
        }
    }

    /// Record the state replaced by a commit
    pub fn record(&mut self, previous: Arc<EditorState>) {
        if let Some(batch) = &mut self.batch {
            if batch.recorded {
                return;
            }
            batch.recorded = true;
        }

        self.undo_stack.push(previous);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Pop the state to return to, pushing `current` onto the redo stack
    pub fn undo(&mut self, current: Arc<EditorState>) -> Option<Arc<EditorState>> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: Arc<EditorState>) -> Option<Arc<EditorState>> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Start grouping commits. Nested batches fold into the outermost one.
    pub fn begin_batch(&mut self) {
        match &mut self.batch {
            Some(batch) => batch.depth += 1,
            None => {
                self.batch = Some(BatchState {
                    depth: 1,
                    recorded: false,
                })
            }
        }
    }

    pub fn end_batch(&mut self) {
        if let Some(batch) = &mut self.batch {
            batch.depth -= 1;
            if batch.depth == 0 {
                self.batch = None;
            }
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
