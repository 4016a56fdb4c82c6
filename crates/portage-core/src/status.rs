// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status checker registry.
//!
//! Checkers are registered at startup, keyed by resource type, and consulted
//! by the polling loop to decide whether an active transfer has finished.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::process::TransferProcess;
use crate::types::ProvisionedResource;

/// Predicate reporting whether an active transfer has finished for a
/// resource type.
pub trait StatusChecker: Send + Sync {
    /// True when the transfer is complete from this resource's perspective.
    fn is_complete(&self, process: &TransferProcess, resources: &[ProvisionedResource]) -> bool;
}

impl<F> StatusChecker for F
where
    F: Fn(&TransferProcess, &[ProvisionedResource]) -> bool + Send + Sync,
{
    fn is_complete(&self, process: &TransferProcess, resources: &[ProvisionedResource]) -> bool {
        self(process, resources)
    }
}

/// Maps resource type tags to status checkers.
#[derive(Default)]
pub struct StatusCheckerRegistry {
    checkers: RwLock<HashMap<String, Arc<dyn StatusChecker>>>,
}

impl StatusCheckerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker for a resource type, replacing any previous one.
    pub fn register(&self, resource_type: impl Into<String>, checker: Arc<dyn StatusChecker>) {
        self.checkers
            .write()
            .expect("status checker registry lock poisoned")
            .insert(resource_type.into(), checker);
    }

    /// Resolve the checker for a resource type, if one was registered.
    pub fn resolve(&self, resource_type: &str) -> Option<Arc<dyn StatusChecker>> {
        self.checkers
            .read()
            .expect("status checker registry lock poisoned")
            .get(resource_type)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataAddress, DataRequest, TransferRole, TransferType};
    use std::collections::HashMap as StdHashMap;

    fn process() -> TransferProcess {
        let request = DataRequest {
            id: "req-1".to_string(),
            asset_id: "asset-1".to_string(),
            connector_address: "https://other.example".to_string(),
            contract_id: "contract-1".to_string(),
            destination: DataAddress::new("object-storage"),
            transfer_type: TransferType::finite(),
            managed_resources: true,
            is_sync: false,
            properties: StdHashMap::new(),
        };
        TransferProcess::new(TransferRole::Consumer, request)
    }

    #[test]
    fn test_resolve_registered_checker() {
        let registry = StatusCheckerRegistry::new();
        registry.register(
            "object-storage",
            Arc::new(|_: &TransferProcess, _: &[ProvisionedResource]| true),
        );

        let checker = registry.resolve("object-storage").unwrap();
        assert!(checker.is_complete(&process(), &[]));
        assert!(registry.resolve("http-push").is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let registry = StatusCheckerRegistry::new();
        registry.register(
            "object-storage",
            Arc::new(|_: &TransferProcess, _: &[ProvisionedResource]| false),
        );
        registry.register(
            "object-storage",
            Arc::new(|_: &TransferProcess, _: &[ProvisionedResource]| true),
        );

        let checker = registry.resolve("object-storage").unwrap();
        assert!(checker.is_complete(&process(), &[]));
    }
}
