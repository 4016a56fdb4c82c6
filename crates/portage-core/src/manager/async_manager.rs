// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asynchronous transfer process manager.
//!
//! The durable state machine: one background worker per manager pulls
//! bounded batches of processes per state, executes the state's transition
//! logic against the external collaborators, and persists every change. A
//! collaborator failure fails the affected process, never the cycle.
//!
//! Provisioning completions arrive as [`ProvisionEvent`]s over a channel and
//! are applied on the worker, so every process mutation happens on a single
//! task and the store stays the only source of truth between cycles.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{RemoteMessageDispatcher, TransferRequestMessage};
use crate::error::TransferError;
use crate::listener::ListenerRegistry;
use crate::process::{TransferProcess, TransferProcessState};
use crate::provision::{ProvisionContext, ProvisionEvent, ProvisionManager};
use crate::retry::{ExponentialRetryDelay, SendRetryPolicy};
use crate::status::StatusCheckerRegistry;
use crate::store::TransferProcessStore;
use crate::types::{DataRequest, TransferRole};
use crate::wait::{ExponentialWaitStrategy, WaitStrategy};

/// Builder for creating an [`AsyncTransferManager`].
pub struct AsyncTransferManagerBuilder {
    store: Option<Arc<dyn TransferProcessStore>>,
    provision_manager: Option<Arc<dyn ProvisionManager>>,
    dispatcher: Option<Arc<dyn RemoteMessageDispatcher>>,
    status_checkers: Option<Arc<StatusCheckerRegistry>>,
    listeners: Option<Arc<ListenerRegistry>>,
    retry_policy: Option<SendRetryPolicy>,
    wait_strategy: Option<Box<dyn WaitStrategy>>,
    batch_size: usize,
}

impl std::fmt::Debug for AsyncTransferManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTransferManagerBuilder")
            .field("store", &self.store.as_ref().map(|_| "..."))
            .field(
                "provision_manager",
                &self.provision_manager.as_ref().map(|_| "..."),
            )
            .field("dispatcher", &self.dispatcher.as_ref().map(|_| "..."))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for AsyncTransferManagerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            provision_manager: None,
            dispatcher: None,
            status_checkers: None,
            listeners: None,
            retry_policy: None,
            wait_strategy: None,
            batch_size: Config::default().batch_size,
        }
    }
}

impl AsyncTransferManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the process store (required).
    pub fn store(mut self, store: Arc<dyn TransferProcessStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the provision manager (required).
    pub fn provision_manager(mut self, provision_manager: Arc<dyn ProvisionManager>) -> Self {
        self.provision_manager = Some(provision_manager);
        self
    }

    /// Set the remote dispatcher (required).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn RemoteMessageDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Set the status checker registry. Defaults to an empty registry.
    pub fn status_checkers(mut self, status_checkers: Arc<StatusCheckerRegistry>) -> Self {
        self.status_checkers = Some(status_checkers);
        self
    }

    /// Set the listener registry. Defaults to an empty registry.
    pub fn listeners(mut self, listeners: Arc<ListenerRegistry>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Set the send retry policy. Defaults to the [`Config`] defaults.
    pub fn retry_policy(mut self, retry_policy: SendRetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Set the idle wait strategy. Defaults to the [`Config`] defaults.
    pub fn wait_strategy(mut self, wait_strategy: Box<dyn WaitStrategy>) -> Self {
        self.wait_strategy = Some(wait_strategy);
        self
    }

    /// Set the per-state batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Build the manager.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<AsyncTransferManager> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let provision_manager = self
            .provision_manager
            .ok_or_else(|| anyhow::anyhow!("provision manager is required"))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| anyhow::anyhow!("dispatcher is required"))?;

        let defaults = Config::default();
        let retry_policy = self.retry_policy.unwrap_or_else(|| {
            SendRetryPolicy::new(
                defaults.send_retry_limit,
                Box::new(ExponentialRetryDelay::new(defaults.send_retry_base_delay_ms)),
            )
        });
        let wait_strategy = self.wait_strategy.unwrap_or_else(|| {
            Box::new(ExponentialWaitStrategy::new(
                defaults.poll_delay_ms,
                defaults.poll_delay_cap_ms,
            ))
        });

        Ok(AsyncTransferManager {
            inner: Arc::new(ManagerInner {
                store,
                provision_manager,
                dispatcher,
                status_checkers: self
                    .status_checkers
                    .unwrap_or_else(|| Arc::new(StatusCheckerRegistry::new())),
                listeners: self
                    .listeners
                    .unwrap_or_else(|| Arc::new(ListenerRegistry::new())),
                retry_policy,
                wait_strategy: StdMutex::new(wait_strategy),
                batch_size: self.batch_size,
            }),
            worker: Mutex::new(None),
        })
    }
}

/// The durable transfer process manager.
///
/// [`initiate_consumer_request`](Self::initiate_consumer_request) and
/// [`initiate_provider_request`](Self::initiate_provider_request) persist an
/// idempotent record and return immediately; the background worker started
/// by [`start`](Self::start) advances records through the state graph.
pub struct AsyncTransferManager {
    inner: Arc<ManagerInner>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for AsyncTransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTransferManager").finish_non_exhaustive()
    }
}

struct Worker {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AsyncTransferManager {
    /// Create a new builder for configuring the manager.
    pub fn builder() -> AsyncTransferManagerBuilder {
        AsyncTransferManagerBuilder::new()
    }

    /// The listener registry notified on terminal transitions.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.inner.listeners
    }

    /// The status checker registry consulted during completion checks.
    pub fn status_checkers(&self) -> &Arc<StatusCheckerRegistry> {
        &self.inner.status_checkers
    }

    /// Create a consumer-side process for the request, or resolve the
    /// existing one. Safe to invoke repeatedly for the same request id.
    pub async fn initiate_consumer_request(
        &self,
        request: DataRequest,
    ) -> Result<String, TransferError> {
        self.inner.initiate(TransferRole::Consumer, request).await
    }

    /// Create a provider-side process for the request, or resolve the
    /// existing one. Safe to invoke repeatedly for the same request id.
    pub async fn initiate_provider_request(
        &self,
        request: DataRequest,
    ) -> Result<String, TransferError> {
        self.inner.initiate(TransferRole::Provider, request).await
    }

    /// Trigger resource teardown for a `COMPLETED` process.
    ///
    /// Invoked by the management surface once a completed transfer should
    /// release its resources; the polling loop itself never initiates
    /// teardown. The process moves to `DEPROVISIONING` and reaches
    /// `DEPROVISIONED` when the provision manager reports back.
    pub async fn deprovision(&self, process_id: &str) -> Result<(), TransferError> {
        self.inner.deprovision(process_id).await
    }

    /// Start the background polling worker. A no-op when already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("transfer manager already started");
            return;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.inner
            .provision_manager
            .start(ProvisionContext::new(event_tx))
            .await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(self.inner.clone(), event_rx, shutdown_rx));
        *worker = Some(Worker {
            shutdown_tx,
            handle,
        });

        info!(batch_size = self.inner.batch_size, "transfer manager started");
    }

    /// Stop the background worker. The worker finishes its current cycle;
    /// in-flight collaborator calls are awaited, not cancelled.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            let _ = worker.shutdown_tx.send(true);
            if let Err(e) = worker.handle.await {
                error!(error = %e, "transfer manager worker panicked");
            }
            info!("transfer manager stopped");
        }
    }

    /// Check if the background worker is running.
    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

struct ManagerInner {
    store: Arc<dyn TransferProcessStore>,
    provision_manager: Arc<dyn ProvisionManager>,
    dispatcher: Arc<dyn RemoteMessageDispatcher>,
    status_checkers: Arc<StatusCheckerRegistry>,
    listeners: Arc<ListenerRegistry>,
    retry_policy: SendRetryPolicy,
    wait_strategy: StdMutex<Box<dyn WaitStrategy>>,
    batch_size: usize,
}

/// The worker loop: poll, transition, persist, wait.
///
/// Cycles that made progress loop again immediately; empty cycles sleep for
/// the wait strategy's delay, waking early for shutdown or provision events.
async fn run_loop(
    inner: Arc<ManagerInner>,
    mut events: mpsc::UnboundedReceiver<ProvisionEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("transfer process worker running");

    // Stop selecting on the event channel once every sender is gone, so a
    // dropped provisioner does not turn the idle wait into a busy loop.
    let mut events_open = true;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let transitions = inner.poll_cycle(&mut events).await;
        if transitions > 0 {
            inner.wait_success();
            tokio::task::yield_now().await;
            continue;
        }

        let delay_ms = inner.next_delay_ms();
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }

            event = events.recv(), if events_open => {
                match event {
                    Some(event) => {
                        if inner.handle_provision_event(event).await > 0 {
                            inner.wait_success();
                        }
                    }
                    None => events_open = false,
                }
            }

            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
        }
    }

    info!("transfer process worker stopped");
}

impl ManagerInner {
    async fn initiate(
        &self,
        role: TransferRole,
        request: DataRequest,
    ) -> Result<String, TransferError> {
        if request.id.is_empty() {
            return Err(TransferError::Validation {
                field: "id".to_string(),
                message: "request id must not be empty".to_string(),
            });
        }

        // Idempotent no-op for a request id that already has a process.
        if let Some(existing) = self.store.process_id_for_transfer_id(&request.id).await? {
            debug!(
                process_id = %existing,
                transfer_id = %request.id,
                "process already exists for request"
            );
            return Ok(existing);
        }

        let mut process = TransferProcess::new(role, request);
        process.transition_initial()?;
        self.store.create(&process).await?;

        info!(
            process_id = %process.id(),
            transfer_id = %process.correlation_id(),
            "transfer process created"
        );
        Ok(process.id().to_string())
    }

    /// One polling cycle over all actionable states, in priority order.
    /// Returns the number of state transitions performed.
    async fn poll_cycle(&self, events: &mut mpsc::UnboundedReceiver<ProvisionEvent>) -> usize {
        let mut transitions = 0;

        // Callback-driven transitions first, so a resource provisioned since
        // the last cycle unblocks its process within this one.
        while let Ok(event) = events.try_recv() {
            transitions += self.handle_provision_event(event).await;
        }

        transitions += self.provision_initial().await;
        transitions += self.send_provisioned().await;
        transitions += self.check_provisioned().await;
        transitions += self.check_complete().await;
        transitions += self.retry_requesting().await;
        transitions
    }

    /// Begin resource teardown for a completed process.
    async fn deprovision(&self, process_id: &str) -> Result<(), TransferError> {
        let mut process =
            self.store
                .find(process_id)
                .await?
                .ok_or_else(|| TransferError::ProcessNotFound {
                    process_id: process_id.to_string(),
                })?;
        if process.state() != TransferProcessState::Completed {
            return Err(TransferError::InvalidTransition {
                process_id: process.id().to_string(),
                from: process.state().as_str().to_string(),
                to: TransferProcessState::Deprovisioning.as_str().to_string(),
            });
        }

        // Persist DEPROVISIONING before invoking the provisioner so its
        // callback never races a stale COMPLETED record.
        process.transition_deprovisioning()?;
        self.store.update(&process).await?;
        info!(process_id = %process.id(), "transfer deprovisioning");

        if let Err(e) = self.provision_manager.deprovision(&process).await {
            self.fail_process(&mut process, e.to_string()).await;
            return Err(e);
        }
        Ok(())
    }

    /// `INITIAL`: prepare the manifest and begin provisioning.
    async fn provision_initial(&self) -> usize {
        let mut transitions = 0;
        for mut process in self.batch(TransferProcessState::Initial).await {
            match self.begin_provisioning(&mut process).await {
                Ok(()) => {
                    if self.persist(&process).await {
                        transitions += 1;
                    }
                }
                Err(e) => {
                    transitions += self.fail_process(&mut process, e.to_string()).await;
                }
            }
        }
        transitions
    }

    async fn begin_provisioning(
        &self,
        process: &mut TransferProcess,
    ) -> Result<(), TransferError> {
        if !process.data_request().managed_resources {
            // Unmanaged resources are prepared outside this connector.
            process.transition_provisioning()?;
            process.transition_provisioned()?;
            return Ok(());
        }

        let manifest = self.provision_manager.prepare_manifest(process).await?;
        process.set_resource_manifest(manifest);
        process.transition_provisioning()?;

        if process.resource_manifest().is_empty() {
            process.transition_provisioned()?;
            return Ok(());
        }

        self.provision_manager.provision(process).await
    }

    /// `PROVISIONED`: send the transfer request to the counterparty.
    async fn send_provisioned(&self) -> usize {
        let mut transitions = 0;
        for mut process in self.batch(TransferProcessState::Provisioned).await {
            transitions += self.attempt_send(&mut process).await;
        }
        transitions
    }

    /// `REQUESTING`: re-send previously failed requests, subject to the
    /// retry policy.
    async fn retry_requesting(&self) -> usize {
        let mut transitions = 0;
        for mut process in self.batch(TransferProcessState::Requesting).await {
            if self.retry_policy.retries_exhausted(&process) {
                let detail = format!(
                    "send retries exhausted after {} attempts",
                    process.state_count()
                );
                transitions += self.fail_process(&mut process, detail).await;
                continue;
            }
            if self.retry_policy.should_delay(&process) {
                debug!(process_id = %process.id(), "send deferred by retry policy");
                continue;
            }
            transitions += self.attempt_send(&mut process).await;
        }
        transitions
    }

    /// Send the transfer request for a process in `PROVISIONED` or
    /// `REQUESTING`. A failed attempt bumps the attempt counter and does not
    /// count as forward progress.
    async fn attempt_send(&self, process: &mut TransferProcess) -> usize {
        let message = TransferRequestMessage::from_process(process);
        match self.dispatcher.send(message).await {
            Ok(_) => {
                if let Err(e) = process.transition_requested() {
                    error!(process_id = %process.id(), error = %e, "invalid transition");
                    return 0;
                }
                if self.persist(process).await {
                    debug!(process_id = %process.id(), "transfer request sent");
                    1
                } else {
                    0
                }
            }
            Err(e) => {
                warn!(
                    process_id = %process.id(),
                    attempts = process.state_count(),
                    error = %e,
                    "transfer request send failed"
                );
                if process.state() == TransferProcessState::Provisioned
                    && process.transition_requesting().is_err()
                {
                    return 0;
                }
                process.bump_state_count();
                self.persist(process).await;
                0
            }
        }
    }

    /// `REQUESTED_ACK`: start the transfer once resources exist, splitting
    /// finite transfers from streaming ones.
    async fn check_provisioned(&self) -> usize {
        let mut transitions = 0;
        for mut process in self.batch(TransferProcessState::RequestedAck).await {
            if process.provisioned_resources().is_empty() {
                // Nothing local to start; the remote acknowledgement path
                // will populate resources.
                continue;
            }
            let result = if process.data_request().transfer_type.is_finite {
                process.transition_in_progress()
            } else {
                process.transition_streaming()
            };
            match result {
                Ok(()) => {
                    if self.persist(&process).await {
                        transitions += 1;
                    }
                }
                Err(e) => {
                    error!(process_id = %process.id(), error = %e, "invalid transition");
                }
            }
        }
        transitions
    }

    /// `IN_PROGRESS`/`STREAMING`: transition to `COMPLETED` once every
    /// provisioned resource reports complete.
    async fn check_complete(&self) -> usize {
        let mut transitions = 0;
        for state in [
            TransferProcessState::InProgress,
            TransferProcessState::Streaming,
        ] {
            for mut process in self.batch(state).await {
                if !self.resources_complete(&process) {
                    process.bump_state_count();
                    self.persist(&process).await;
                    continue;
                }
                if let Err(e) = process.transition_completed() {
                    error!(process_id = %process.id(), error = %e, "invalid transition");
                    continue;
                }
                if self.persist(&process).await {
                    transitions += 1;
                    info!(process_id = %process.id(), "transfer completed");
                    self.listeners.notify_completed(&process);
                }
            }
        }
        transitions
    }

    fn resources_complete(&self, process: &TransferProcess) -> bool {
        // A missing checker counts as complete: managed resources use the
        // automatic-completion convention, unmanaged ones need no checker.
        process.provisioned_resources().iter().all(|resource| {
            match self.status_checkers.resolve(&resource.resource_type) {
                Some(checker) => checker.is_complete(process, process.provisioned_resources()),
                None => true,
            }
        })
    }

    /// Apply a provisioning report from the channel.
    async fn handle_provision_event(&self, event: ProvisionEvent) -> usize {
        match event {
            ProvisionEvent::Provisioned {
                process_id,
                resource,
            } => {
                let Some(mut process) = self.find(&process_id).await else {
                    return 0;
                };
                process.add_provisioned_resource(resource);
                let mut transitions = 0;
                if process.state() == TransferProcessState::Provisioning
                    && process.provisioning_complete()
                {
                    if let Err(e) = process.transition_provisioned() {
                        error!(process_id = %process.id(), error = %e, "invalid transition");
                    } else {
                        debug!(process_id = %process.id(), "all resources provisioned");
                        transitions = 1;
                    }
                }
                self.persist(&process).await;
                transitions
            }
            ProvisionEvent::Deprovisioned { process_id } => {
                let Some(mut process) = self.find(&process_id).await else {
                    return 0;
                };
                // The provisioner may report back before the DEPROVISIONING
                // update landed.
                if process.state() == TransferProcessState::Completed
                    && process.transition_deprovisioning().is_err()
                {
                    return 0;
                }
                if process.state() != TransferProcessState::Deprovisioning {
                    warn!(
                        process_id = %process.id(),
                        state = %process.state(),
                        "deprovisioned report for process not in DEPROVISIONING"
                    );
                    return 0;
                }
                if let Err(e) = process.transition_deprovisioned() {
                    error!(process_id = %process.id(), error = %e, "invalid transition");
                    return 0;
                }
                if self.persist(&process).await {
                    info!(process_id = %process.id(), "transfer deprovisioned");
                    self.listeners.notify_deprovisioned(&process);
                    1
                } else {
                    0
                }
            }
            ProvisionEvent::Failed { process_id, detail } => {
                let Some(mut process) = self.find(&process_id).await else {
                    return 0;
                };
                if process.state().is_terminal() {
                    return 0;
                }
                self.fail_process(&mut process, detail).await
            }
        }
    }

    async fn batch(&self, state: TransferProcessState) -> Vec<TransferProcess> {
        match self.store.next_for_state(state, self.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(state = %state, error = %e, "failed to fetch processes");
                Vec::new()
            }
        }
    }

    async fn find(&self, process_id: &str) -> Option<TransferProcess> {
        match self.store.find(process_id).await {
            Ok(Some(process)) => Some(process),
            Ok(None) => {
                warn!(process_id = %process_id, "event for unknown process");
                None
            }
            Err(e) => {
                error!(process_id = %process_id, error = %e, "failed to load process");
                None
            }
        }
    }

    /// Persist the process, logging failures. Returns true on success.
    async fn persist(&self, process: &TransferProcess) -> bool {
        if let Err(e) = self.store.update(process).await {
            error!(process_id = %process.id(), error = %e, "failed to persist transfer process");
            return false;
        }
        true
    }

    /// Record an unrecoverable failure on the process. Terminal.
    async fn fail_process(&self, process: &mut TransferProcess, detail: String) -> usize {
        warn!(process_id = %process.id(), detail = %detail, "transfer process failed");
        if process.transition_error(detail).is_err() {
            return 0;
        }
        if self.persist(process).await { 1 } else { 0 }
    }

    fn wait_success(&self) {
        self.wait_strategy
            .lock()
            .expect("wait strategy lock poisoned")
            .success();
    }

    fn next_delay_ms(&self) -> u64 {
        self.wait_strategy
            .lock()
            .expect("wait strategy lock poisoned")
            .wait_for_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProcessStore;
    use crate::types::{DataAddress, ProvisionedResource, ResourceDefinition, TransferType};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provisioner that reports one resource per manifest entry through the
    /// context as soon as `provision` is called.
    #[derive(Default)]
    struct ImmediateProvisioner {
        context: StdMutex<Option<ProvisionContext>>,
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

    struct OkDispatcher {
        sends: AtomicU32,
    }

    impl OkDispatcher {
        fn new() -> Self {
            Self {
                sends: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteMessageDispatcher for OkDispatcher {
        async fn send(
            &self,
            _message: TransferRequestMessage,
        ) -> Result<Option<serde_json::Value>, TransferError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn request(id: &str, finite: bool) -> DataRequest {
        DataRequest {
            id: id.to_string(),
            asset_id: "asset-1".to_string(),
            connector_address: "https://other.example".to_string(),
            contract_id: "contract-1".to_string(),
            destination: DataAddress::new("object-storage"),
            transfer_type: if finite {
                TransferType::finite()
            } else {
                TransferType::streaming()
            },
            managed_resources: true,
            is_sync: false,
            properties: HashMap::new(),
        }
    }

    fn manager(store: Arc<InMemoryProcessStore>) -> AsyncTransferManager {
        AsyncTransferManager::builder()
            .store(store)
            .provision_manager(Arc::new(ImmediateProvisioner::default()))
            .dispatcher(Arc::new(OkDispatcher::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_missing_store() {
        let result = AsyncTransferManager::builder()
            .provision_manager(Arc::new(ImmediateProvisioner::default()))
            .dispatcher(Arc::new(OkDispatcher::new()))
            .build();
        assert!(result.unwrap_err().to_string().contains("store is required"));
    }

    #[test]
    fn test_builder_missing_provision_manager() {
        let result = AsyncTransferManager::builder()
            .store(Arc::new(InMemoryProcessStore::new()))
            .dispatcher(Arc::new(OkDispatcher::new()))
            .build();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("provision manager is required")
        );
    }

    #[test]
    fn test_builder_missing_dispatcher() {
        let result = AsyncTransferManager::builder()
            .store(Arc::new(InMemoryProcessStore::new()))
            .provision_manager(Arc::new(ImmediateProvisioner::default()))
            .build();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("dispatcher is required")
        );
    }

    #[tokio::test]
    async fn test_initiate_is_idempotent() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());

        let first = manager
            .initiate_consumer_request(request("req-1", true))
            .await
            .unwrap();
        let second = manager
            .initiate_consumer_request(request("req-1", true))
            .await
            .unwrap();

        assert_eq!(first, second);
        let process = store.find(&first).await.unwrap().unwrap();
        assert_eq!(process.state(), TransferProcessState::Initial);
    }

    #[tokio::test]
    async fn test_initiate_rejects_empty_id() {
        let manager = manager(Arc::new(InMemoryProcessStore::new()));
        let err = manager
            .initiate_consumer_request(request("", true))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_check_provisioned_splits_finite_and_streaming() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());

        let mut staged = Vec::new();
        for (id, finite) in [("req-finite", true), ("req-streaming", false)] {
            let mut process = TransferProcess::new(TransferRole::Consumer, request(id, finite));
            process.transition_initial().unwrap();
            process.transition_provisioning().unwrap();
            process.transition_provisioned().unwrap();
            process.transition_requested().unwrap();
            process.transition_requested_ack().unwrap();
            process.add_provisioned_resource(ProvisionedResource {
                id: "res-1".to_string(),
                definition_id: "d-1".to_string(),
                resource_type: "object-storage".to_string(),
                properties: HashMap::new(),
            });
            store.create(&process).await.unwrap();
            staged.push(process.id().to_string());
        }

        let transitions = manager.inner.check_provisioned().await;
        assert_eq!(transitions, 2);

        let finite = store.find(&staged[0]).await.unwrap().unwrap();
        assert_eq!(finite.state(), TransferProcessState::InProgress);
        let streaming = store.find(&staged[1]).await.unwrap().unwrap();
        assert_eq!(streaming.state(), TransferProcessState::Streaming);
    }

    #[tokio::test]
    async fn test_check_provisioned_without_resources_is_noop() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());

        let mut process = TransferProcess::new(TransferRole::Consumer, request("req-1", true));
        process.transition_initial().unwrap();
        process.transition_provisioning().unwrap();
        process.transition_provisioned().unwrap();
        process.transition_requested().unwrap();
        process.transition_requested_ack().unwrap();
        store.create(&process).await.unwrap();

        assert_eq!(manager.inner.check_provisioned().await, 0);
        let unchanged = store.find(process.id()).await.unwrap().unwrap();
        assert_eq!(unchanged.state(), TransferProcessState::RequestedAck);
    }

    #[tokio::test]
    async fn test_check_complete_waits_for_checker() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());
        manager.status_checkers().register(
            "object-storage",
            Arc::new(|_: &TransferProcess, _: &[ProvisionedResource]| false),
        );

        let mut process = TransferProcess::new(TransferRole::Consumer, request("req-1", true));
        process.transition_initial().unwrap();
        process.transition_provisioning().unwrap();
        process.transition_provisioned().unwrap();
        process.transition_requested().unwrap();
        process.transition_requested_ack().unwrap();
        process.add_provisioned_resource(ProvisionedResource {
            id: "res-1".to_string(),
            definition_id: "d-1".to_string(),
            resource_type: "object-storage".to_string(),
            properties: HashMap::new(),
        });
        process.transition_in_progress().unwrap();
        store.create(&process).await.unwrap();

        assert_eq!(manager.inner.check_complete().await, 0);
        let unchanged = store.find(process.id()).await.unwrap().unwrap();
        assert_eq!(unchanged.state(), TransferProcessState::InProgress);
        // The cycle counted against the state.
        assert_eq!(unchanged.state_count(), 1);

        manager.status_checkers().register(
            "object-storage",
            Arc::new(|_: &TransferProcess, _: &[ProvisionedResource]| true),
        );
        assert_eq!(manager.inner.check_complete().await, 1);
        let completed = store.find(process.id()).await.unwrap().unwrap();
        assert_eq!(completed.state(), TransferProcessState::Completed);
    }

    #[tokio::test]
    async fn test_deprovision_requires_a_completed_process() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());

        let process_id = manager
            .initiate_consumer_request(request("req-1", true))
            .await
            .unwrap();

        // Still INITIAL: teardown is rejected.
        let err = manager.deprovision(&process_id).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");

        let err = manager.deprovision("missing").await.unwrap_err();
        assert_eq!(err.error_code(), "PROCESS_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deprovision_moves_completed_process_to_deprovisioning() {
        let store = Arc::new(InMemoryProcessStore::new());
        let manager = manager(store.clone());

        let mut process = TransferProcess::new(TransferRole::Consumer, request("req-1", true));
        process.transition_initial().unwrap();
        process.transition_completed().unwrap();
        store.create(&process).await.unwrap();

        manager.deprovision(process.id()).await.unwrap();
        let updated = store.find(process.id()).await.unwrap().unwrap();
        assert_eq!(updated.state(), TransferProcessState::Deprovisioning);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let manager = manager(Arc::new(InMemoryProcessStore::new()));
        assert!(!manager.is_running().await);

        manager.start().await;
        assert!(manager.is_running().await);
        // Second start is a no-op.
        manager.start().await;

        manager.stop().await;
        assert!(!manager.is_running().await);
    }
}
