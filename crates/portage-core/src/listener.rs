// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Listener registry for terminal transfer events.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::process::TransferProcess;

/// Interested party notified on terminal transfer transitions.
///
/// Notification is synchronous, on the manager's worker, after the
/// triggering state has been persisted.
pub trait TransferListener: Send + Sync {
    /// The process reached `COMPLETED`.
    fn completed(&self, process: &TransferProcess) {
        let _ = process;
    }

    /// The process reached `DEPROVISIONED`.
    fn deprovisioned(&self, process: &TransferProcess) {
        let _ = process;
    }
}

/// De-duplicated listener collection, keyed by registration name.
///
/// Re-registering a name replaces the previous listener; unregistering an
/// absent name is a no-op.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<BTreeMap<String, Arc<dyn TransferListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under a name, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, listener: Arc<dyn TransferListener>) {
        self.listeners
            .write()
            .expect("listener registry lock poisoned")
            .insert(name.into(), listener);
    }

    /// Remove the listener registered under the name, if any.
    pub fn unregister(&self, name: &str) {
        self.listeners
            .write()
            .expect("listener registry lock poisoned")
            .remove(name);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .expect("listener registry lock poisoned")
            .len()
    }

    /// True when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every listener that the process completed.
    pub fn notify_completed(&self, process: &TransferProcess) {
        for listener in self.snapshot() {
            listener.completed(process);
        }
    }

    /// Notify every listener that the process was deprovisioned.
    pub fn notify_deprovisioned(&self, process: &TransferProcess) {
        for listener in self.snapshot() {
            listener.deprovisioned(process);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn TransferListener>> {
        self.listeners
            .read()
            .expect("listener registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
