// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory process store for embedding and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransferError;
use crate::process::{TransferProcess, TransferProcessState};

use super::TransferProcessStore;

#[derive(Default)]
struct Inner {
    processes: HashMap<String, TransferProcess>,
    /// correlation id -> process id
    correlations: HashMap<String, String>,
}

/// Map-backed [`TransferProcessStore`] with no durability.
///
/// Suitable for embedding the managers into a host application that supplies
/// its own durability elsewhere, and as the store for tests.
#[derive(Default)]
pub struct InMemoryProcessStore {
    inner: Mutex<Inner>,
}

impl InMemoryProcessStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning means a panic while holding the guard; treat it as
        // a programming error rather than masking it.
        self.inner.lock().expect("process store lock poisoned")
    }
}

#[async_trait]
impl TransferProcessStore for InMemoryProcessStore {
    async fn create(&self, process: &TransferProcess) -> Result<(), TransferError> {
        let mut inner = self.lock();
        if inner.processes.contains_key(process.id()) {
            return Err(TransferError::Store {
                operation: "create".to_string(),
                details: format!("process '{}' already exists", process.id()),
            });
        }
        inner
            .correlations
            .insert(process.correlation_id().to_string(), process.id().to_string());
        inner
            .processes
            .insert(process.id().to_string(), process.clone());
        Ok(())
    }

    async fn update(&self, process: &TransferProcess) -> Result<(), TransferError> {
        let mut inner = self.lock();
        if !inner.processes.contains_key(process.id()) {
            return Err(TransferError::Store {
                operation: "update".to_string(),
                details: format!("process '{}' does not exist", process.id()),
            });
        }
        inner
            .processes
            .insert(process.id().to_string(), process.clone());
        Ok(())
    }

    async fn find(&self, process_id: &str) -> Result<Option<TransferProcess>, TransferError> {
        Ok(self.lock().processes.get(process_id).cloned())
    }

    async fn process_id_for_transfer_id(
        &self,
        transfer_id: &str,
    ) -> Result<Option<String>, TransferError> {
        Ok(self.lock().correlations.get(transfer_id).cloned())
    }

    async fn next_for_state(
        &self,
        state: TransferProcessState,
        max: usize,
    ) -> Result<Vec<TransferProcess>, TransferError> {
        let inner = self.lock();
        let mut matching: Vec<TransferProcess> = inner
            .processes
            .values()
            .filter(|process| process.state() == state)
            .cloned()
            .collect();
        // Oldest first, with the id as tie-breaker for a stable order.
        matching.sort_by(|a, b| {
            a.state_timestamp()
                .cmp(&b.state_timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        matching.truncate(max);
        Ok(matching)
    }
}
