// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fault-isolated listener registry.
//!
//! Used by the connection monitor, the operation queue and the coordinator.
//! A listener is invoked with the current value on subscription (when one
//! exists) and on every publish. A listener that panics is logged and
//! skipped; the remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Listener registry for values of type `T`.
pub struct Listeners<T> {
    name: &'static str,
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Listeners<T> {
    /// Create an empty registry. `name` appears in logs when a listener panics.
    pub fn new(name: &'static str) -> Self {
        Listeners {
            name,
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<T>> {
        // Callbacks never run under the lock, so a poisoned registry is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a listener, invoking it with `initial` first when given.
    pub fn subscribe<F>(&self, initial: Option<&T>, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(listener);
        let id = {
            let mut registry = self.registry();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::clone(&callback)));
            id
        };

        if let Some(value) = initial {
            invoke(self.name, &callback, value);
        }

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut registry = inner.lock().unwrap_or_else(|e| e.into_inner());
                registry.entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invoke every registered listener with `value`.
    pub fn publish(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .registry()
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in &callbacks {
            invoke(self.name, callback, value);
        }
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.registry().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.registry().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn invoke<T>(name: &str, callback: &Callback<T>, value: &T) {
    if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
        tracing::warn!("{} listener panicked; continuing with remaining listeners", name);
    }
}

/// Handle returned by `subscribe`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Vec<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F: FnOnce() + Send + Sync + 'static>(cancel: F) -> Self {
        Subscription {
            cancel: vec![Box::new(cancel)],
        }
    }

    /// Merge several subscriptions into one handle.
    pub fn combine(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut cancel = Vec::new();
        for mut sub in subscriptions {
            cancel.append(&mut sub.cancel);
        }
        Subscription { cancel }
    }

    /// Stop receiving updates.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for cancel in self.cancel.drain(..) {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("listeners", &self.cancel.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "listeners_tests.rs"]
mod tests;
