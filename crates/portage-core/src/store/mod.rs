// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process store interface and backends.
//!
//! The store is the single source of truth for transfer processes between
//! polling cycles. Durable backends live outside this crate; the bundled
//! [`memory::InMemoryProcessStore`] covers embedding and tests.

pub mod memory;

pub use self::memory::InMemoryProcessStore;

use async_trait::async_trait;

use crate::error::TransferError;
use crate::process::{TransferProcess, TransferProcessState};

/// Durable keyed storage for transfer processes with state-indexed retrieval.
///
/// Implementations must be safe for concurrent `find`/`update`/
/// `next_for_state` calls. `next_for_state` must return processes in a
/// stable, forward-progressing order (oldest state timestamp first) so that
/// bounded batches never perpetually skip a record.
///
/// `create` is not required to guard against concurrent duplicate creation
/// for the same correlation id; callers wanting strict idempotency under
/// concurrent retries should enforce a unique constraint on the correlation
/// id at the backend.
#[allow(missing_docs)]
#[async_trait]
pub trait TransferProcessStore: Send + Sync {
    async fn create(&self, process: &TransferProcess) -> Result<(), TransferError>;

    async fn update(&self, process: &TransferProcess) -> Result<(), TransferError>;

    async fn find(&self, process_id: &str) -> Result<Option<TransferProcess>, TransferError>;

    /// Resolve the process id created for an originating request id.
    async fn process_id_for_transfer_id(
        &self,
        transfer_id: &str,
    ) -> Result<Option<String>, TransferError>;

    /// Fetch up to `max` processes in the given state, oldest state
    /// timestamp first.
    async fn next_for_state(
        &self,
        state: TransferProcessState,
        max: usize,
    ) -> Result<Vec<TransferProcess>, TransferError>;
}
