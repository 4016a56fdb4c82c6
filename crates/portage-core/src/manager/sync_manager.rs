// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synchronous transfer process manager.
//!
//! The fast path for requests that must complete within a single
//! request/response exchange. No polling, no provisioning: the consumer side
//! performs the protocol exchange inline, the provider side answers with a
//! ready-made access proxy. A process record is still persisted for
//! observability and idempotent-lookup symmetry with the asynchronous path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatch::{RemoteMessageDispatcher, TransferRequestMessage};
use crate::error::TransferError;
use crate::process::{TransferProcess, TransferProcessState};
use crate::proxy::ProxyResolver;
use crate::store::TransferProcessStore;
use crate::types::{DataRequest, InitiateResponse, TransferRole};

/// Handles requests whose semantics require an immediate reply.
pub struct SyncTransferManager {
    store: Arc<dyn TransferProcessStore>,
    dispatcher: Arc<dyn RemoteMessageDispatcher>,
    proxy_resolver: Arc<dyn ProxyResolver>,
    request_timeout: Duration,
}

impl SyncTransferManager {
    /// Create a manager with the given collaborators and dispatch timeout.
    pub fn new(
        store: Arc<dyn TransferProcessStore>,
        dispatcher: Arc<dyn RemoteMessageDispatcher>,
        proxy_resolver: Arc<dyn ProxyResolver>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            proxy_resolver,
            request_timeout,
        }
    }

    /// Perform the protocol exchange inline and block, within the configured
    /// timeout, for the counterparty's response.
    ///
    /// On a payload response the process is completed and the payload
    /// returned; a missing payload, a dispatch failure, a timeout, or an
    /// error recorded concurrently on the process all yield a fatal-error
    /// response without completing the process.
    pub async fn initiate_consumer_request(
        &self,
        request: DataRequest,
    ) -> Result<InitiateResponse, TransferError> {
        let mut process = self.create_process(TransferRole::Consumer, request).await?;
        let process_id = process.id().to_string();

        let message = TransferRequestMessage::from_process(&process);
        let outcome = tokio::time::timeout(self.request_timeout, self.dispatcher.send(message)).await;

        let payload = match outcome {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => {
                warn!(process_id = %process_id, "dispatcher returned no response");
                return Ok(InitiateResponse::fatal_error(
                    Some(process_id),
                    "dispatcher returned no response",
                ));
            }
            Ok(Err(e)) => {
                warn!(process_id = %process_id, error = %e, "synchronous dispatch failed");
                return Ok(InitiateResponse::fatal_error(Some(process_id), e.to_string()));
            }
            Err(_) => {
                warn!(
                    process_id = %process_id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "synchronous dispatch timed out"
                );
                return Ok(InitiateResponse::fatal_error(
                    Some(process_id),
                    "timed out waiting for dispatcher response",
                ));
            }
        };

        // An error may have been reported on the record while the exchange
        // was in flight; the persisted process wins.
        if let Some(current) = self.store.find(&process_id).await? {
            if current.state() == TransferProcessState::Error {
                let detail = current
                    .error_detail()
                    .unwrap_or("transfer process failed")
                    .to_string();
                warn!(process_id = %process_id, detail = %detail, "error reported during exchange");
                return Ok(InitiateResponse::fatal_error(Some(process_id), detail));
            }
            process = current;
        }

        process.transition_completed()?;
        self.store.update(&process).await?;
        info!(process_id = %process_id, "synchronous transfer completed");

        Ok(InitiateResponse::ok(process_id, Some(payload)))
    }

    /// Answer a provider-side request with a ready-made access proxy for the
    /// request's destination type. No dispatcher call is made; the proxy
    /// itself encodes how the consumer accesses the data.
    pub async fn initiate_provider_request(
        &self,
        request: DataRequest,
    ) -> Result<InitiateResponse, TransferError> {
        let process = self.create_process(TransferRole::Provider, request).await?;
        let process_id = process.id().to_string();

        match self.proxy_resolver.proxy_for(process.data_request()) {
            Some(entry) => {
                let data = serde_json::to_value(&entry).map_err(|e| TransferError::Validation {
                    field: "proxy".to_string(),
                    message: e.to_string(),
                })?;
                info!(
                    process_id = %process_id,
                    proxy_type = %entry.proxy_type,
                    "proxy resolved for synchronous request"
                );
                Ok(InitiateResponse::ok(process_id, Some(data)))
            }
            None => {
                let destination_type = process.data_request().destination_type();
                warn!(
                    process_id = %process_id,
                    destination_type = %destination_type,
                    "no proxy available"
                );
                Ok(InitiateResponse::fatal_error(
                    Some(process_id),
                    format!(
                        "no proxy available for destination type '{}'",
                        destination_type
                    ),
                ))
            }
        }
    }

    async fn create_process(
        &self,
        role: TransferRole,
        request: DataRequest,
    ) -> Result<TransferProcess, TransferError> {
        if request.id.is_empty() {
            return Err(TransferError::Validation {
                field: "id".to_string(),
                message: "request id must not be empty".to_string(),
            });
        }

        // Idempotent-lookup symmetry with the asynchronous path.
        if let Some(existing_id) = self.store.process_id_for_transfer_id(&request.id).await?
            && let Some(existing) = self.store.find(&existing_id).await?
        {
            debug!(
                process_id = %existing_id,
                transfer_id = %request.id,
                "process already exists for request"
            );
            return Ok(existing);
        }

        let mut process = TransferProcess::new(role, request);
        process.transition_initial()?;
        // Persisted in REQUESTED: the record must never appear in a state
        // the polling loop fetches, the exchange happens inline.
        process.transition_requested()?;
        self.store.create(&process).await?;
        Ok(process)
    }
}
