//! Sign-in lifecycle notifications.
//!
//! Subscribers register a closure and get back a [`SubscriptionId`]; they stay
//! registered until [`SessionEvents::unsubscribe`] is called with that id.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

/// Handle returned by a subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Channel<T> {
    name: &'static str,
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Channel<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, id: SubscriptionId, handler: Handler<T>) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    fn len(&self) -> usize {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn emit(&self, payload: &T) {
        // Snapshot so handlers can (un)subscribe without deadlocking
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                error!(event = self.name, "Session event handler panicked");
            }
        }
    }
}

/// Observer registry for `SessionStarted` and `SessionCompleted(success)`.
pub struct SessionEvents {
    next_id: AtomicU64,
    started: Channel<()>,
    completed: Channel<bool>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            started: Channel::new("session_started"),
            completed: Channel::new("session_completed"),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe_started<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.started.add(id, Arc::new(move |_: &()| handler()));
        id
    }

    /// The handler receives `true` when sign-in succeeded.
    pub fn subscribe_completed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.completed
            .add(id, Arc::new(move |success: &bool| handler(*success)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // Ids are unique across both channels
        self.started.remove(id) || self.completed.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.started.len() + self.completed.len()
    }

    pub(crate) fn emit_started(&self) {
        self.started.emit(&());
    }

    pub(crate) fn emit_completed(&self, success: bool) {
        self.completed.emit(&success);
    }
}
