// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request, resource, and response types shared across the transfer managers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which side of the transfer this connector plays for a given process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferRole {
    /// The node requesting data from a counterparty.
    Consumer,
    /// The node serving data to a counterparty.
    Provider,
}

/// An addressable data endpoint (source or destination).
///
/// The `address_type` key is what provisioners, proxies, and status checkers
/// are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAddress {
    /// Keyed type, e.g. a storage backend identifier.
    pub address_type: String,
    /// Backend-specific connection properties.
    pub properties: HashMap<String, String>,
}

impl DataAddress {
    /// Create an address of the given type with no properties.
    pub fn new(address_type: impl Into<String>) -> Self {
        Self {
            address_type: address_type.into(),
            properties: HashMap::new(),
        }
    }
}

/// Describes whether a transfer has a definite end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferType {
    /// Optional content type hint forwarded to the counterparty.
    pub content_type: Option<String>,
    /// True for transfers with a definite end; false for open-ended streams.
    pub is_finite: bool,
}

impl TransferType {
    /// A finite transfer (definite end).
    pub fn finite() -> Self {
        Self {
            content_type: None,
            is_finite: true,
        }
    }

    /// A streaming transfer (no definite end).
    pub fn streaming() -> Self {
        Self {
            content_type: None,
            is_finite: false,
        }
    }
}

/// A request to move data between two connectors.
///
/// The request is immutable once a process record has been created from it;
/// its `id` is the idempotency key for process creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Originating request id; correlates the process with the caller.
    pub id: String,
    /// Asset to be transferred.
    pub asset_id: String,
    /// Address of the counterparty connector.
    pub connector_address: String,
    /// Contract under which the transfer runs.
    pub contract_id: String,
    /// Where the data should land.
    pub destination: DataAddress,
    /// Finite or streaming semantics.
    pub transfer_type: TransferType,
    /// Whether resource lifecycle (including completion signaling) is tracked
    /// by this connector. Unmanaged resources skip local provisioning.
    pub managed_resources: bool,
    /// Routes the request to the synchronous fast path instead of the
    /// durable polling manager.
    pub is_sync: bool,
    /// Free-form properties forwarded to the counterparty.
    pub properties: HashMap<String, String>,
}

impl DataRequest {
    /// The destination address type, used for provisioner/proxy/checker lookup.
    pub fn destination_type(&self) -> &str {
        &self.destination.address_type
    }
}

/// A resource the provision manager must prepare before the transfer starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Unique id of the definition within its manifest.
    pub id: String,
    /// Resource type, matched against provisioned resources and checkers.
    pub resource_type: String,
}

/// A resource reported ready by the provision manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    /// Unique id of the provisioned resource.
    pub id: String,
    /// The manifest definition this resource satisfies.
    pub definition_id: String,
    /// Resource type, used to resolve a status checker.
    pub resource_type: String,
    /// Backend-specific properties (endpoints, credentials references).
    pub properties: HashMap<String, String>,
}

/// Outcome classification of an `initiate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// The request was accepted (asynchronous path) or completed
    /// (synchronous path).
    Ok,
    /// The request failed and will not be retried.
    FatalError,
}

/// Response returned by the transfer managers for an `initiate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiateResponse {
    /// Id of the process record created or resolved for the request.
    pub process_id: Option<String>,
    /// Payload carried by a successful synchronous exchange (dispatcher
    /// response or proxy descriptor). Absent on the asynchronous path.
    pub data: Option<serde_json::Value>,
    /// Outcome classification.
    pub status: ResponseStatus,
    /// Human-readable detail when `status` is [`ResponseStatus::FatalError`].
    pub error_detail: Option<String>,
}

impl InitiateResponse {
    /// A successful response.
    pub fn ok(process_id: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            process_id: Some(process_id.into()),
            data,
            status: ResponseStatus::Ok,
            error_detail: None,
        }
    }

    /// A fatal-error response carrying the error detail.
    pub fn fatal_error(process_id: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            process_id,
            data: None,
            status: ResponseStatus::FatalError,
            error_detail: Some(detail.into()),
        }
    }

    /// True when the request was accepted or completed.
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}
