// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Transfer manager configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum processes fetched per state per polling cycle
    pub batch_size: usize,
    /// Attempts before an outbound send is abandoned
    pub send_retry_limit: u32,
    /// Base delay between send attempts, in milliseconds
    pub send_retry_base_delay_ms: u64,
    /// Idle delay after an empty polling cycle, in milliseconds
    pub poll_delay_ms: u64,
    /// Upper bound for the idle delay, in milliseconds
    pub poll_delay_cap_ms: u64,
    /// How long the synchronous path waits for a dispatcher response
    pub sync_request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 5,
            send_retry_limit: 7,
            send_retry_base_delay_ms: 1_000,
            poll_delay_ms: 1_000,
            poll_delay_cap_ms: 60_000,
            sync_request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional, with defaults:
    /// - `PORTAGE_BATCH_SIZE`: processes per state per cycle (default: 5)
    /// - `PORTAGE_SEND_RETRY_LIMIT`: send attempts before failing (default: 7)
    /// - `PORTAGE_SEND_RETRY_BASE_DELAY_MS`: base send retry delay (default: 1000)
    /// - `PORTAGE_POLL_DELAY_MS`: idle delay after an empty cycle (default: 1000)
    /// - `PORTAGE_POLL_DELAY_CAP_MS`: idle delay upper bound (default: 60000)
    /// - `PORTAGE_SYNC_REQUEST_TIMEOUT_MS`: sync dispatch timeout (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let batch_size = parse_var(
            "PORTAGE_BATCH_SIZE",
            defaults.batch_size,
            "must be a positive integer",
        )?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid(
                "PORTAGE_BATCH_SIZE",
                "must be a positive integer",
            ));
        }

        let send_retry_limit = parse_var(
            "PORTAGE_SEND_RETRY_LIMIT",
            defaults.send_retry_limit,
            "must be a non-negative integer",
        )?;

        let send_retry_base_delay_ms = parse_var(
            "PORTAGE_SEND_RETRY_BASE_DELAY_MS",
            defaults.send_retry_base_delay_ms,
            "must be a non-negative integer",
        )?;

        let poll_delay_ms = parse_var(
            "PORTAGE_POLL_DELAY_MS",
            defaults.poll_delay_ms,
            "must be a non-negative integer",
        )?;

        let poll_delay_cap_ms = parse_var(
            "PORTAGE_POLL_DELAY_CAP_MS",
            defaults.poll_delay_cap_ms,
            "must be a non-negative integer",
        )?;

        let sync_timeout_ms: u64 = parse_var(
            "PORTAGE_SYNC_REQUEST_TIMEOUT_MS",
            defaults.sync_request_timeout.as_millis() as u64,
            "must be a non-negative integer",
        )?;

        Ok(Self {
            batch_size,
            send_retry_limit,
            send_retry_base_delay_ms,
            poll_delay_ms,
            poll_delay_cap_ms,
            sync_request_timeout: Duration::from_millis(sync_timeout_ms),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    message: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, message)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
