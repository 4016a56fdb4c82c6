// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Portage Core - Transfer Process Orchestration Engine
//!
//! This crate coordinates long-running data-transfer transactions between two
//! cooperating connectors (a consumer and a provider). It owns the transfer
//! process state machine, the polling worker that drives it, the send
//! retry/backoff policy, and the dispatch between the durable and the
//! synchronous execution strategy. Everything else - durable storage, the
//! wire protocol, resource provisioning, proxy provisioning - is an external
//! collaborator consumed through a trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         External Clients                                 │
//! │                 (management API, protocol adapters)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ initiate (is_sync?)
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TransferManager (front door)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!              │ is_sync = false                     │ is_sync = true
//!              ▼                                     ▼
//! ┌───────────────────────────┐          ┌────────────────────────────┐
//! │   AsyncTransferManager    │          │    SyncTransferManager     │
//! │  (polling state machine)  │          │  (inline exchange / proxy) │
//! └───────────────────────────┘          └────────────────────────────┘
//!      │           │         │                  │            │
//!      ▼           ▼         ▼                  ▼            ▼
//! ┌─────────┐ ┌──────────┐ ┌──────────┐   ┌──────────┐ ┌────────────┐
//! │ Process │ │Provision │ │ Remote   │   │ Remote   │ │   Proxy    │
//! │  Store  │ │ Manager  │ │Dispatcher│   │Dispatcher│ │  Resolver  │
//! └─────────┘ └──────────┘ └──────────┘   └──────────┘ └────────────┘
//! ```
//!
//! # Asynchronous strategy
//!
//! [`manager::AsyncTransferManager`] persists an idempotent process record
//! per request id and returns immediately. A single background worker then
//! advances every non-terminal record: per cycle it pulls a bounded batch of
//! processes per state, executes the state's transition logic against the
//! collaborators, and persists each change. The store is the single source
//! of truth between cycles.
//!
//! | Cycle step | State | Action |
//! |------------|-------|--------|
//! | 1 | (channel) | apply provisioned/deprovisioned/failed reports |
//! | 2 | `INITIAL` | prepare manifest, begin provisioning |
//! | 3 | `PROVISIONED` | send transfer request to the counterparty |
//! | 4 | `REQUESTED_ACK` | start the transfer once resources exist |
//! | 5 | `IN_PROGRESS`/`STREAMING` | check completion per resource type |
//! | 6 | `REQUESTING` | re-send failed requests, per the retry policy |
//!
//! Cycles that made progress loop again immediately; empty cycles back off
//! exponentially via the [`wait::WaitStrategy`]. Failed sends are retried
//! with exponentially growing delays until the retry budget is spent, then
//! the process fails ([`retry::SendRetryPolicy`]). Teardown of a `COMPLETED`
//! process is triggered through `deprovision`, not by the loop; the
//! provisioner's callback then finishes the lifecycle at `DEPROVISIONED`.
//!
//! # Synchronous strategy
//!
//! [`manager::SyncTransferManager`] handles requests that must complete
//! within a single exchange: the consumer side dispatches inline and blocks
//! (bounded) for the response; the provider side answers with a ready-made
//! access proxy. Both persist a process record for observability, but never
//! enter the polling loop.
//!
//! # Transfer Process State Machine
//!
//! ```text
//!  UNSAVED ──► INITIAL ──► PROVISIONING ──► PROVISIONED ──► REQUESTED
//!                                               │               │
//!                                               ▼               ▼
//!                                          REQUESTING ──► REQUESTED_ACK
//!                                               │               │
//!                                   (exhausted) │      ┌────────┴────────┐
//!                                               ▼      ▼                 ▼
//!                                             ERROR  IN_PROGRESS     STREAMING
//!                                               ▲      │                 │
//!                                               │      └────────┬────────┘
//!                                               │               ▼
//!                        (any non-terminal) ────┘           COMPLETED
//!                                                               │
//!                                                               ▼
//!                                                        DEPROVISIONING
//!                                                               │
//!                                                               ▼
//!                                                        DEPROVISIONED
//! ```
//!
//! State only moves forward (or diverts once to `ERROR`). `IN_PROGRESS` is
//! reached when the transfer type is finite, `STREAMING` when it is not;
//! both behave identically for completion checking.
//!
//! # Configuration
//!
//! [`config::Config`] loads from environment variables, all optional:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORTAGE_BATCH_SIZE` | `5` | Processes per state per polling cycle |
//! | `PORTAGE_SEND_RETRY_LIMIT` | `7` | Send attempts before failing |
//! | `PORTAGE_SEND_RETRY_BASE_DELAY_MS` | `1000` | Base send retry delay |
//! | `PORTAGE_POLL_DELAY_MS` | `1000` | Idle delay after an empty cycle |
//! | `PORTAGE_POLL_DELAY_CAP_MS` | `60000` | Idle delay upper bound |
//! | `PORTAGE_SYNC_REQUEST_TIMEOUT_MS` | `10000` | Sync dispatch timeout |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`dispatch`]: Remote dispatcher boundary and the outbound message
//! - [`error`]: Error types with stable error codes
//! - [`listener`]: Listener registry for terminal transfer events
//! - [`manager`]: Front door and the two execution strategies
//! - [`process`]: The transfer process record and state machine
//! - [`provision`]: Provisioning boundary and completion events
//! - [`proxy`]: Provider-side proxy resolution
//! - [`retry`]: Send retry policy
//! - [`status`]: Status checker registry
//! - [`store`]: Process store trait and the in-memory backend
//! - [`types`]: Request, resource, and response types
//! - [`wait`]: Idle wait strategy for the polling loop

#![deny(missing_docs)]

/// Configuration loading from environment variables.
pub mod config;

/// Remote dispatcher boundary and the outbound transfer request message.
pub mod dispatch;

/// Error types for transfer orchestration with stable error codes.
pub mod error;

/// Listener registry for terminal transfer events.
pub mod listener;

/// The front door and the asynchronous/synchronous managers.
pub mod manager;

/// The transfer process record and its state machine.
pub mod process;

/// Provisioning boundary: manager trait, context, and completion events.
pub mod provision;

/// Provider-side proxy resolution for the synchronous path.
pub mod proxy;

/// Send retry policy for outbound protocol messages.
pub mod retry;

/// Status checker registry for completion checking.
pub mod status;

/// Process store interface and backends.
pub mod store;

/// Request, resource, and response types.
pub mod types;

/// Idle wait strategy for the polling loop.
pub mod wait;
