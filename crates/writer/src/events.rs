//! Hierarchical lifecycle events
//!
//! Listeners registered on a node are invoked for every event dispatched on
//! that node or on any of its descendants:
//!
//! ```text
//! volumes ──clone──> volume ──clone──> writer
//! ```
//!
//! Dispatch starts at the node itself and walks towards the root. Within a
//! node the most recently registered listener runs first. All listeners are
//! invoked even if some fail, failures are collected into a [`MultiError`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, MultiError};

type OpenFn<T> = dyn Fn(&T) -> Result<(), BoxError> + Send + Sync;
type CloseFn<T> = dyn Fn(&T, Option<&(dyn Error + 'static)>) -> Result<(), BoxError> + Send + Sync;

struct Listeners<T: ?Sized> {
    on_open: Vec<Arc<OpenFn<T>>>,
    on_close: Vec<Arc<CloseFn<T>>>,
}

impl<T: ?Sized> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            on_open: Vec::new(),
            on_close: Vec::new(),
        }
    }
}

/// Node of the event hierarchy
pub struct Events<T: ?Sized> {
    parent: Option<Arc<Events<T>>>,
    listeners: Mutex<Listeners<T>>,
}

impl<T: ?Sized> Events<T> {
    /// Create a root node
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            listeners: Mutex::new(Listeners::default()),
        })
    }

    /// Create a child node, events dispatched on it also reach this node
    pub fn clone_child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            listeners: Mutex::new(Listeners::default()),
        })
    }

    /// Register an open listener
    pub fn on_open<F>(&self, f: F)
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.lock().on_open.push(Arc::new(f));
    }

    /// Register a close listener, it receives the close error if any
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn(&T, Option<&(dyn Error + 'static)>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.lock().on_close.push(Arc::new(f));
    }

    /// Invoke open listeners of this node and all ancestors
    pub fn dispatch_on_open(&self, value: &T) -> Result<(), MultiError> {
        let mut errs = MultiError::new();
        let mut node = Some(self);
        while let Some(events) = node {
            // Listeners may register further listeners, do not hold the lock
            let listeners = events.listeners.lock().on_open.clone();
            for f in listeners.iter().rev() {
                errs.check(f(value));
            }
            node = events.parent.as_deref();
        }
        errs.into_result()
    }

    /// Invoke close listeners of this node and all ancestors
    pub fn dispatch_on_close(
        &self,
        value: &T,
        err: Option<&(dyn Error + 'static)>,
    ) -> Result<(), MultiError> {
        let mut errs = MultiError::new();
        let mut node = Some(self);
        while let Some(events) = node {
            let listeners = events.listeners.lock().on_close.clone();
            for f in listeners.iter().rev() {
                errs.check(f(value, err));
            }
            node = events.parent.as_deref();
        }
        errs.into_result()
    }
}

impl<T: ?Sized> fmt::Debug for Events<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("Events")
            .field("on_open", &listeners.on_open.len())
            .field("on_close", &listeners.on_close.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;
