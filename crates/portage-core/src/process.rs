// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The transfer process record and its state machine.
//!
//! A [`TransferProcess`] is the durable entity tracking one transfer. State
//! only ever moves forward along the state graph (or diverts once to
//! [`TransferProcessState::Error`]); all mutation goes through the transition
//! methods so the forward-only invariant cannot be broken by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransferError;
use crate::types::{DataRequest, ProvisionedResource, ResourceDefinition, TransferRole};

/// States a transfer process moves through.
///
/// The numeric codes define the ordering; transitions must strictly increase
/// the code, except for the divert to [`Error`](Self::Error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferProcessState {
    /// Created in memory, not yet persisted.
    Unsaved,
    /// Persisted, waiting for the first polling cycle.
    Initial,
    /// Resource provisioning is in flight.
    Provisioning,
    /// All manifest resources are ready.
    Provisioned,
    /// An outbound request send failed and is being retried.
    Requesting,
    /// The transfer request was sent to the counterparty.
    Requested,
    /// The counterparty acknowledged the request.
    RequestedAck,
    /// Data is moving; the transfer has a definite end.
    InProgress,
    /// Data is moving; the transfer is open-ended.
    Streaming,
    /// The transfer finished; teardown has not started yet.
    Completed,
    /// Resource teardown is in flight.
    Deprovisioning,
    /// All resources are torn down. Terminal.
    Deprovisioned,
    /// The process failed unrecoverably. Terminal.
    Error,
}

impl TransferProcessState {
    /// Numeric state code; defines the forward ordering.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unsaved => 0,
            Self::Initial => 100,
            Self::Provisioning => 200,
            Self::Provisioned => 300,
            Self::Requesting => 400,
            Self::Requested => 500,
            Self::RequestedAck => 600,
            Self::InProgress => 700,
            Self::Streaming => 750,
            Self::Completed => 800,
            Self::Deprovisioning => 900,
            Self::Deprovisioned => 1000,
            Self::Error => -1,
        }
    }

    /// Resolve a state from its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unsaved),
            100 => Some(Self::Initial),
            200 => Some(Self::Provisioning),
            300 => Some(Self::Provisioned),
            400 => Some(Self::Requesting),
            500 => Some(Self::Requested),
            600 => Some(Self::RequestedAck),
            700 => Some(Self::InProgress),
            750 => Some(Self::Streaming),
            800 => Some(Self::Completed),
            900 => Some(Self::Deprovisioning),
            1000 => Some(Self::Deprovisioned),
            -1 => Some(Self::Error),
            _ => None,
        }
    }

    /// Upper-case state name, as used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsaved => "UNSAVED",
            Self::Initial => "INITIAL",
            Self::Provisioning => "PROVISIONING",
            Self::Provisioned => "PROVISIONED",
            Self::Requesting => "REQUESTING",
            Self::Requested => "REQUESTED",
            Self::RequestedAck => "REQUESTED_ACK",
            Self::InProgress => "IN_PROGRESS",
            Self::Streaming => "STREAMING",
            Self::Completed => "COMPLETED",
            Self::Deprovisioning => "DEPROVISIONING",
            Self::Deprovisioned => "DEPROVISIONED",
            Self::Error => "ERROR",
        }
    }

    /// True for states after which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deprovisioned | Self::Error)
    }

    /// True for the two active-transfer states, which behave identically
    /// with respect to completion checking.
    pub fn is_active_transfer(&self) -> bool {
        matches!(self, Self::InProgress | Self::Streaming)
    }
}

impl std::fmt::Display for TransferProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable record tracking one transfer's state and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProcess {
    id: String,
    role: TransferRole,
    state: TransferProcessState,
    state_count: u32,
    state_timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    data_request: DataRequest,
    resource_manifest: Vec<ResourceDefinition>,
    provisioned_resources: Vec<ProvisionedResource>,
    error_detail: Option<String>,
}

impl TransferProcess {
    /// Create a new process in [`TransferProcessState::Unsaved`] for the
    /// given request. The process id is generated; the request id becomes
    /// the correlation id.
    pub fn new(role: TransferRole, data_request: DataRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            state: TransferProcessState::Unsaved,
            state_count: 0,
            state_timestamp: now,
            created_at: now,
            data_request,
            resource_manifest: Vec::new(),
            provisioned_resources: Vec::new(),
            error_detail: None,
        }
    }

    /// Stable process id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The originating request id, used for idempotent lookups.
    pub fn correlation_id(&self) -> &str {
        &self.data_request.id
    }

    /// Which side of the transfer this process runs on.
    pub fn role(&self) -> TransferRole {
        self.role
    }

    /// Current state.
    pub fn state(&self) -> TransferProcessState {
        self.state
    }

    /// Number of polling cycles spent acting in the current state.
    pub fn state_count(&self) -> u32 {
        self.state_count
    }

    /// Wall-clock time of the last state transition.
    pub fn state_timestamp(&self) -> DateTime<Utc> {
        self.state_timestamp
    }

    /// When the process record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The originating request. Immutable after creation.
    pub fn data_request(&self) -> &DataRequest {
        &self.data_request
    }

    /// Resource definitions to provision before the transfer can start.
    pub fn resource_manifest(&self) -> &[ResourceDefinition] {
        &self.resource_manifest
    }

    /// Resources reported ready by the provision manager so far.
    pub fn provisioned_resources(&self) -> &[ProvisionedResource] {
        &self.provisioned_resources
    }

    /// Error detail recorded on terminal failure.
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Replace the resource manifest. Set once, before provisioning starts.
    pub fn set_resource_manifest(&mut self, manifest: Vec<ResourceDefinition>) {
        self.resource_manifest = manifest;
    }

    /// Record a resource reported ready by the provision manager.
    pub fn add_provisioned_resource(&mut self, resource: ProvisionedResource) {
        self.provisioned_resources.push(resource);
    }

    /// True once every manifest definition has a matching provisioned resource.
    pub fn provisioning_complete(&self) -> bool {
        self.resource_manifest.iter().all(|definition| {
            self.provisioned_resources
                .iter()
                .any(|resource| resource.definition_id == definition.id)
        })
    }

    /// Increment the state counter for a polling cycle in which the process
    /// was acted on but remained in its current state.
    pub fn bump_state_count(&mut self) {
        self.state_count += 1;
    }

    /// Move to [`TransferProcessState::Initial`].
    pub fn transition_initial(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Initial)
    }

    /// Move to [`TransferProcessState::Provisioning`].
    pub fn transition_provisioning(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Provisioning)
    }

    /// Move to [`TransferProcessState::Provisioned`].
    pub fn transition_provisioned(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Provisioned)
    }

    /// Move to [`TransferProcessState::Requesting`] after a failed send.
    pub fn transition_requesting(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Requesting)
    }

    /// Move to [`TransferProcessState::Requested`] after a successful send.
    pub fn transition_requested(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Requested)
    }

    /// Move to [`TransferProcessState::RequestedAck`]. Invoked by the inbound
    /// protocol adapter when the counterparty acknowledges the request.
    pub fn transition_requested_ack(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::RequestedAck)
    }

    /// Move to [`TransferProcessState::InProgress`] (finite transfers).
    pub fn transition_in_progress(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::InProgress)
    }

    /// Move to [`TransferProcessState::Streaming`] (non-finite transfers).
    pub fn transition_streaming(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Streaming)
    }

    /// Move to [`TransferProcessState::Completed`].
    pub fn transition_completed(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Completed)
    }

    /// Move to [`TransferProcessState::Deprovisioning`].
    pub fn transition_deprovisioning(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Deprovisioning)
    }

    /// Move to [`TransferProcessState::Deprovisioned`]. Terminal.
    pub fn transition_deprovisioned(&mut self) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Deprovisioned)
    }

    /// Move to [`TransferProcessState::Error`] with the given detail.
    /// Reachable from any non-terminal state. Terminal.
    pub fn transition_error(&mut self, detail: impl Into<String>) -> Result<(), TransferError> {
        self.transition(TransferProcessState::Error)?;
        self.error_detail = Some(detail.into());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_state_timestamp_for_test(&mut self, timestamp: DateTime<Utc>) {
        self.state_timestamp = timestamp;
    }

    #[cfg(test)]
    pub(crate) fn set_state_count_for_test(&mut self, count: u32) {
        self.state_count = count;
    }

    fn transition(&mut self, target: TransferProcessState) -> Result<(), TransferError> {
        let valid = !self.state.is_terminal()
            && (target == TransferProcessState::Error || target.code() > self.state.code());
        if !valid {
            return Err(TransferError::InvalidTransition {
                process_id: self.id.clone(),
                from: self.state.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
        self.state = target;
        self.state_count = 0;
        self.state_timestamp = Utc::now();
        Ok(())
    }
}
