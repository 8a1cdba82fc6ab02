//! Listener delivery.
//!
//! A listener may call back into the handle that notified it. Delivery to a
//! listener that is already running on the current thread is queued and
//! replayed once its outer call returns, so the listener sees every commit in
//! order without locking itself twice.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use crate::document::{ChangeEvent, EditorState, Listener};

pub(crate) type SharedListener = Arc<Mutex<Listener>>;

/// One commit, bound to the listeners registered when it landed
pub(crate) struct Notification {
    pub event: ChangeEvent,
    pub state: Arc<EditorState>,
    pub listeners: Vec<SharedListener>,
}

type Backlog = Vec<(ChangeEvent, Arc<EditorState>)>;

thread_local! {
    static RUNNING: RefCell<Vec<(usize, Backlog)>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn deliver(notifications: Vec<Notification>) {
    for notification in notifications {
        for listener in &notification.listeners {
            call(listener, &notification.event, &notification.state);
        }
    }
}

fn address(listener: &SharedListener) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// Removes the running marker even if the listener panics
struct Running(usize);

impl Drop for Running {
    fn drop(&mut self) {
        let id = self.0;
        RUNNING.with(|running| running.borrow_mut().retain(|(entry, _)| *entry != id));
    }
}

fn call(listener: &SharedListener, event: &ChangeEvent, state: &Arc<EditorState>) {
    let id = address(listener);
    let queued = RUNNING.with(|running| {
        let mut running = running.borrow_mut();
        match running.iter_mut().find(|(entry, _)| *entry == id) {
            Some((_, backlog)) => {
                backlog.push((event.clone(), Arc::clone(state)));
                true
            }
            None => {
                running.push((id, Vec::new()));
                false
            }
        }
    });
    if queued {
        return;
    }

    let _running = Running(id);
    let mut callback = listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut next = Some((event.clone(), Arc::clone(state)));
    while let Some((event, state)) = next {
        (callback)(&event, &state);
        next = RUNNING.with(|running| {
            let mut running = running.borrow_mut();
            running
                .iter_mut()
                .find(|(entry, _)| *entry == id)
                .and_then(|(_, backlog)| (!backlog.is_empty()).then(|| backlog.remove(0)))
        });
    }
}
