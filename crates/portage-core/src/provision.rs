// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning boundary.
//!
//! Resource provisioning is asynchronous: the manager hands the provision
//! manager a [`ProvisionContext`] at startup and receives completion reports
//! as [`ProvisionEvent`]s over a channel. This decouples the manager's
//! polling cadence from the provisioner's completion timing and keeps all
//! process mutation on the manager's worker.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransferError;
use crate::process::TransferProcess;
use crate::types::{ProvisionedResource, ResourceDefinition};

/// Events reported by the provision manager back to the polling manager.
#[derive(Debug, Clone)]
pub enum ProvisionEvent {
    /// A resource finished provisioning.
    Provisioned {
        /// The process the resource belongs to.
        process_id: String,
        /// The resource that is now ready.
        resource: ProvisionedResource,
    },
    /// All resources for the process have been torn down.
    Deprovisioned {
        /// The process whose resources are gone.
        process_id: String,
    },
    /// Provisioning or teardown failed unrecoverably.
    Failed {
        /// The process the failure belongs to.
        process_id: String,
        /// Human-readable failure detail.
        detail: String,
    },
}

/// Handle the provision manager uses to report outcomes.
///
/// Cloneable and safe to use from any thread or task. Reports sent after the
/// manager has stopped are dropped.
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    tx: mpsc::UnboundedSender<ProvisionEvent>,
}

impl ProvisionContext {
    pub(crate) fn new(tx: mpsc::UnboundedSender<ProvisionEvent>) -> Self {
        Self { tx }
    }

    /// Report a resource as provisioned.
    pub fn provisioned(&self, process_id: impl Into<String>, resource: ProvisionedResource) {
        self.send(ProvisionEvent::Provisioned {
            process_id: process_id.into(),
            resource,
        });
    }

    /// Report all resources of a process as deprovisioned.
    pub fn deprovisioned(&self, process_id: impl Into<String>) {
        self.send(ProvisionEvent::Deprovisioned {
            process_id: process_id.into(),
        });
    }

    /// Report an unrecoverable provisioning failure.
    pub fn failed(&self, process_id: impl Into<String>, detail: impl Into<String>) {
        self.send(ProvisionEvent::Failed {
            process_id: process_id.into(),
            detail: detail.into(),
        });
    }

    fn send(&self, event: ProvisionEvent) {
        if self.tx.send(event).is_err() {
            debug!("provision event dropped, manager no longer running");
        }
    }
}

/// Asynchronously provisions and deprovisions resources for transfer
/// processes.
///
/// Implementations live outside this crate; completion is reported through
/// the [`ProvisionContext`] received in [`start`](Self::start).
#[async_trait]
pub trait ProvisionManager: Send + Sync {
    /// Called once when the polling manager starts, before any
    /// [`provision`](Self::provision) call.
    async fn start(&self, context: ProvisionContext) {
        let _ = context;
    }

    /// Compute the resource definitions required for the process.
    async fn prepare_manifest(
        &self,
        process: &TransferProcess,
    ) -> Result<Vec<ResourceDefinition>, TransferError>;

    /// Begin provisioning every resource in the process manifest. Completion
    /// is reported per resource through the context.
    async fn provision(&self, process: &TransferProcess) -> Result<(), TransferError>;

    /// Begin tearing down the process's provisioned resources. Completion is
    /// reported through the context.
    async fn deprovision(&self, process: &TransferProcess) -> Result<(), TransferError>;
}
