// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for portage-core integration tests.
//!
//! Provides mock collaborators, request builders, and state-polling helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use portage_core::dispatch::{RemoteMessageDispatcher, TransferRequestMessage};
use portage_core::error::TransferError;
use portage_core::listener::TransferListener;
use portage_core::process::{TransferProcess, TransferProcessState};
use portage_core::provision::{ProvisionContext, ProvisionManager};
use portage_core::store::{InMemoryProcessStore, TransferProcessStore};
use portage_core::types::{
    DataAddress, DataRequest, ProvisionedResource, ResourceDefinition, TransferType,
};

/// Initialize test logging once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a transfer request for tests.
pub fn transfer_request(id: &str, is_sync: bool, finite: bool, managed: bool) -> DataRequest {
    DataRequest {
        id: id.to_string(),
        asset_id: format!("asset-{}", id),
        connector_address: "https://other.example".to_string(),
        contract_id: "contract-1".to_string(),
        destination: DataAddress::new("object-storage"),
        transfer_type: if finite {
            TransferType::finite()
        } else {
            TransferType::streaming()
        },
        managed_resources: managed,
        is_sync,
        properties: HashMap::new(),
    }
}

/// Provisioner that reports one resource per manifest entry through the
/// context as soon as `provision` is called, and reports teardown as soon
/// as `deprovision` is called.
#[derive(Default)]
pub struct ImmediateProvisioner {
    context: Mutex<Option<ProvisionContext>>,
}

#[async_trait]
impl ProvisionManager for ImmediateProvisioner {
    async fn start(&self, context: ProvisionContext) {
        *self.context.lock().unwrap() = Some(context);
    }

    async fn prepare_manifest(
        &self,
        process: &TransferProcess,
    ) -> Result<Vec<ResourceDefinition>, TransferError> {
        Ok(vec![ResourceDefinition {
            id: format!("{}-def", process.id()),
            resource_type: process.data_request().destination_type().to_string(),
        }])
    }

    async fn provision(&self, process: &TransferProcess) -> Result<(), TransferError> {
        let context = self.context.lock().unwrap().clone();
        if let Some(context) = context {
            for definition in process.resource_manifest() {
                context.provisioned(
                    process.id(),
                    ProvisionedResource {
                        id: format!("{}-res", definition.id),
                        definition_id: definition.id.clone(),
                        resource_type: definition.resource_type.clone(),
                        properties: HashMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn deprovision(&self, process: &TransferProcess) -> Result<(), TransferError> {
        let context = self.context.lock().unwrap().clone();
        if let Some(context) = context {
            context.deprovisioned(process.id());
        }
        Ok(())
    }
}

/// Provisioner that accepts provisioning but never reports completion,
/// leaving processes parked in `PROVISIONING`.
pub struct SilentProvisioner;

#[async_trait]
impl ProvisionManager for SilentProvisioner {
    async fn prepare_manifest(
        &self,
        process: &TransferProcess,
    ) -> Result<Vec<ResourceDefinition>, TransferError> {
        Ok(vec![ResourceDefinition {
            id: format!("{}-def", process.id()),
            resource_type: process.data_request().destination_type().to_string(),
        }])
    }

    async fn provision(&self, _process: &TransferProcess) -> Result<(), TransferError> {
        Ok(())
    }

    async fn deprovision(&self, _process: &TransferProcess) -> Result<(), TransferError> {
        Ok(())
    }
}

/// Provisioner that fails every call; proves a path never provisions.
pub struct FailingProvisioner;

#[async_trait]
impl ProvisionManager for FailingProvisioner {
    async fn prepare_manifest(
        &self,
        process: &TransferProcess,
    ) -> Result<Vec<ResourceDefinition>, TransferError> {
        Err(TransferError::Provision {
            process_id: process.id().to_string(),
            details: "provisioner must not be called".to_string(),
        })
    }

    async fn provision(&self, process: &TransferProcess) -> Result<(), TransferError> {
        Err(TransferError::Provision {
            process_id: process.id().to_string(),
            details: "provisioner must not be called".to_string(),
        })
    }

    async fn deprovision(&self, _process: &TransferProcess) -> Result<(), TransferError> {
        Ok(())
    }
}

/// Dispatcher that fails the first `fail_first` sends, then succeeds with
/// the configured payload.
pub struct FlakyDispatcher {
    fail_first: u32,
    payload: Option<serde_json::Value>,
    sends: AtomicU32,
}

impl FlakyDispatcher {
    /// Succeed from the first send on.
    pub fn reliable(payload: Option<serde_json::Value>) -> Self {
        Self::new(0, payload)
    }

    /// Fail the first `fail_first` sends.
    pub fn new(fail_first: u32, payload: Option<serde_json::Value>) -> Self {
        Self {
            fail_first,
            payload,
            sends: AtomicU32::new(0),
        }
    }

    /// Total send attempts observed.
    pub fn sends(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteMessageDispatcher for FlakyDispatcher {
    async fn send(
        &self,
        message: TransferRequestMessage,
    ) -> Result<Option<serde_json::Value>, TransferError> {
        let attempt = self.sends.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(TransferError::Dispatch {
                process_id: message.process_id,
                details: "simulated transport failure".to_string(),
            });
        }
        Ok(self.payload.clone())
    }
}

/// Listener that counts terminal notifications.
#[derive(Default)]
pub struct CountingListener {
    completed: AtomicU32,
    deprovisioned: AtomicU32,
}

impl CountingListener {
    pub fn completed_count(&self) -> u32 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn deprovisioned_count(&self) -> u32 {
        self.deprovisioned.load(Ordering::SeqCst)
    }
}

impl TransferListener for CountingListener {
    fn completed(&self, _process: &TransferProcess) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn deprovisioned(&self, _process: &TransferProcess) {
        self.deprovisioned.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store wrapper that counts `create` calls.
pub struct CountingStore {
    inner: InMemoryProcessStore,
    creates: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryProcessStore::new(),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferProcessStore for CountingStore {
    async fn create(&self, process: &TransferProcess) -> Result<(), TransferError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(process).await
    }

    async fn update(&self, process: &TransferProcess) -> Result<(), TransferError> {
        self.inner.update(process).await
    }

    async fn find(&self, process_id: &str) -> Result<Option<TransferProcess>, TransferError> {
        self.inner.find(process_id).await
    }

    async fn process_id_for_transfer_id(
        &self,
        transfer_id: &str,
    ) -> Result<Option<String>, TransferError> {
        self.inner.process_id_for_transfer_id(transfer_id).await
    }

    async fn next_for_state(
        &self,
        state: TransferProcessState,
        max: usize,
    ) -> Result<Vec<TransferProcess>, TransferError> {
        self.inner.next_for_state(state, max).await
    }
}

/// Poll the store until the process reaches the expected state, panicking
/// after five seconds.
pub async fn wait_for_state(
    store: &dyn TransferProcessStore,
    process_id: &str,
    expected: TransferProcessState,
) -> TransferProcess {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        loop {
            if let Ok(Some(process)) = store.find(process_id).await
                && process.state() == expected
            {
                return process;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    match result {
        Ok(process) => process,
        Err(_) => {
            let current = store
                .find(process_id)
                .await
                .ok()
                .flatten()
                .map(|p| p.state().as_str().to_string())
                .unwrap_or_else(|| "<missing>".to_string());
            panic!(
                "process {} did not reach {} within {:?}, currently {}",
                process_id, expected, deadline, current
            );
        }
    }
}
