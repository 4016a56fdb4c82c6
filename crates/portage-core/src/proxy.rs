// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider-side proxy resolution for the synchronous path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::DataRequest;

/// Descriptor letting a consumer access data directly, without a durable
/// transfer process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
    /// Proxy mechanism identifier, matched to the request's destination type.
    pub proxy_type: String,
    /// Endpoint the consumer connects to.
    pub endpoint: String,
    /// Optional access token for the endpoint.
    pub token: Option<String>,
    /// Mechanism-specific properties.
    pub properties: HashMap<String, String>,
}

/// Resolves ready-made access proxies for synchronous provider requests.
pub trait ProxyResolver: Send + Sync {
    /// The proxy for the request's destination type, if one is available.
    fn proxy_for(&self, request: &DataRequest) -> Option<ProxyEntry>;
}

/// Resolver that never offers a proxy. The default when a deployment has no
/// synchronous provider path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxyResolver;

impl ProxyResolver for NoProxyResolver {
    fn proxy_for(&self, _request: &DataRequest) -> Option<ProxyEntry> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataAddress, TransferType};

    fn request() -> DataRequest {
        DataRequest {
            id: "req-1".to_string(),
            asset_id: "asset-1".to_string(),
            connector_address: "https://other.example".to_string(),
            contract_id: "contract-1".to_string(),
            destination: DataAddress::new("http-pull"),
            transfer_type: TransferType::finite(),
            managed_resources: false,
            is_sync: true,
            properties: HashMap::new(),
        }
    }

    #[test]
    fn test_no_proxy_resolver() {
        assert!(NoProxyResolver.proxy_for(&request()).is_none());
    }

    #[test]
    fn test_proxy_entry_roundtrip() {
        let entry = ProxyEntry {
            proxy_type: "http-pull".to_string(),
            endpoint: "https://data.example/pull".to_string(),
            token: Some("tok".to_string()),
            properties: HashMap::new(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        let back: ProxyEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
