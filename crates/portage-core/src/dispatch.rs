// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote dispatcher boundary.
//!
//! The dispatcher owns the wire protocol; this crate only builds the
//! protocol-agnostic message and consumes the outcome.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::process::TransferProcess;
use crate::types::DataAddress;

/// Protocol message asking the counterparty to begin a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequestMessage {
    /// The local process the message belongs to.
    pub process_id: String,
    /// The originating request id, shared with the counterparty.
    pub transfer_id: String,
    /// Address of the counterparty connector.
    pub connector_address: String,
    /// Asset to be transferred.
    pub asset_id: String,
    /// Contract under which the transfer runs.
    pub contract_id: String,
    /// Where the data should land.
    pub destination: DataAddress,
    /// Free-form request properties.
    pub properties: HashMap<String, String>,
}

impl TransferRequestMessage {
    /// Build the outbound message for a process.
    pub fn from_process(process: &TransferProcess) -> Self {
        let request = process.data_request();
        Self {
            process_id: process.id().to_string(),
            transfer_id: request.id.clone(),
            connector_address: request.connector_address.clone(),
            asset_id: request.asset_id.clone(),
            contract_id: request.contract_id.clone(),
            destination: request.destination.clone(),
            properties: request.properties.clone(),
        }
    }
}

/// Sends protocol messages to the counterparty.
///
/// `Ok(Some(payload))` carries the counterparty's response payload;
/// `Ok(None)` means the message was sent but no payload came back. Transport
/// and protocol failures surface as `Err` and are subject to the send retry
/// policy on the asynchronous path.
#[async_trait]
pub trait RemoteMessageDispatcher: Send + Sync {
    /// Send the message and await the counterparty's response.
    async fn send(
        &self,
        message: TransferRequestMessage,
    ) -> Result<Option<serde_json::Value>, TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataRequest, TransferRole, TransferType};

    #[test]
    fn test_message_from_process() {
        let request = DataRequest {
            id: "req-1".to_string(),
            asset_id: "asset-1".to_string(),
            connector_address: "https://other.example".to_string(),
            contract_id: "contract-1".to_string(),
            destination: DataAddress::new("object-storage"),
            transfer_type: TransferType::finite(),
            managed_resources: true,
            is_sync: false,
            properties: HashMap::from([("region".to_string(), "eu-1".to_string())]),
        };
        let process = TransferProcess::new(TransferRole::Consumer, request);

        let message = TransferRequestMessage::from_process(&process);
        assert_eq!(message.process_id, process.id());
        assert_eq!(message.transfer_id, "req-1");
        assert_eq!(message.connector_address, "https://other.example");
        assert_eq!(message.destination.address_type, "object-storage");
        assert_eq!(message.properties.get("region").map(String::as_str), Some("eu-1"));
    }
}
