// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for portage-core.
//!
//! Provides a unified error type shared by the managers and the collaborator
//! traits. Asynchronous-path failures are recorded on the process and logged,
//! never thrown at the original caller; the variants here cover store access,
//! collaborator calls, and fail-fast validation.

use std::fmt;

/// Result type using TransferError
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that can occur while orchestrating transfer processes.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TransferError {
    /// Process was not found in the store.
    ProcessNotFound {
        /// The process ID that was not found.
        process_id: String,
    },

    /// A transition would move the process backwards or out of a terminal state.
    InvalidTransition {
        /// The process ID.
        process_id: String,
        /// The state the process is currently in.
        from: String,
        /// The state the transition targeted.
        to: String,
    },

    /// Input validation failed.
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Process store operation failed.
    Store {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Sending a protocol message to the counterparty failed.
    Dispatch {
        /// The process the send was for.
        process_id: String,
        /// Error details.
        details: String,
    },

    /// Resource provisioning or deprovisioning failed.
    Provision {
        /// The process the resources belong to.
        process_id: String,
        /// Error details.
        details: String,
    },
}

impl TransferError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProcessNotFound { .. } => "PROCESS_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Store { .. } => "STORE_ERROR",
            Self::Dispatch { .. } => "DISPATCH_ERROR",
            Self::Provision { .. } => "PROVISION_ERROR",
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessNotFound { process_id } => {
                write!(f, "Transfer process '{}' not found", process_id)
            }
            Self::InvalidTransition {
                process_id,
                from,
                to,
            } => {
                write!(
                    f,
                    "Transfer process '{}' cannot transition from '{}' to '{}'",
                    process_id, from, to
                )
            }
            Self::Validation { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::Store { operation, details } => {
                write!(f, "Store error during '{}': {}", operation, details)
            }
            Self::Dispatch {
                process_id,
                details,
            } => {
                write!(
                    f,
                    "Dispatch failed for transfer process '{}': {}",
                    process_id, details
                )
            }
            Self::Provision {
                process_id,
                details,
            } => {
                write!(
                    f,
                    "Provisioning failed for transfer process '{}': {}",
                    process_id, details
                )
            }
        }
    }
}

impl std::error::Error for TransferError {}
