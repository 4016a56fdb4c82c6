// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Send retry policy for outbound protocol messages.
//!
//! Decides, per process, whether a send should execute now, be deferred, or
//! be abandoned. The only inputs are the process's state counter and state
//! timestamp; the delay schedule is pluggable via [`RetryDelayStrategy`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::process::TransferProcess;

/// Clock abstraction so retry decisions are testable.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Computes the delay before the next send attempt, seeded with the number
/// of prior failed attempts in the current state.
pub trait RetryDelayStrategy: Send {
    /// Seed the strategy with the number of prior failures.
    fn failures(&mut self, failures: u32);

    /// The delay, in milliseconds, before the next attempt.
    fn retry_in_millis(&mut self) -> u64;
}

/// Exponential delay: `base * 2^failures`, saturating.
#[derive(Debug, Clone)]
pub struct ExponentialRetryDelay {
    base_delay_ms: u64,
    failures: u32,
}

impl ExponentialRetryDelay {
    /// Create a strategy with the given base delay.
    pub fn new(base_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            failures: 0,
        }
    }
}

impl RetryDelayStrategy for ExponentialRetryDelay {
    fn failures(&mut self, failures: u32) {
        self.failures = failures;
    }

    fn retry_in_millis(&mut self) -> u64 {
        let multiplier = 2u64.saturating_pow(self.failures);
        self.base_delay_ms.saturating_mul(multiplier)
    }
}

/// Decides whether an outbound send should be attempted now, deferred, or
/// abandoned.
pub struct SendRetryPolicy {
    clock: Arc<dyn Clock>,
    delay_strategy: Mutex<Box<dyn RetryDelayStrategy>>,
    send_retry_limit: u32,
}

impl SendRetryPolicy {
    /// Create a policy using the system clock.
    pub fn new(send_retry_limit: u32, delay_strategy: Box<dyn RetryDelayStrategy>) -> Self {
        Self::with_clock(send_retry_limit, delay_strategy, Arc::new(SystemClock))
    }

    /// Create a policy with an injected clock.
    pub fn with_clock(
        send_retry_limit: u32,
        delay_strategy: Box<dyn RetryDelayStrategy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clock,
            delay_strategy: Mutex::new(delay_strategy),
            send_retry_limit,
        }
    }

    /// The configured retry budget.
    pub fn send_retry_limit(&self) -> u32 {
        self.send_retry_limit
    }

    /// True when the send should be deferred: the time elapsed since the
    /// process's last transition is still below the computed delay for its
    /// failure count. An elapsed time equal to the delay attempts now.
    pub fn should_delay(&self, process: &TransferProcess) -> bool {
        let failures = process.state_count().saturating_sub(1);
        let delay_ms = {
            let mut strategy = self
                .delay_strategy
                .lock()
                .expect("retry delay strategy lock poisoned");
            strategy.failures(failures);
            strategy.retry_in_millis()
        };
        let elapsed = self
            .clock
            .now()
            .signed_duration_since(process.state_timestamp());
        let elapsed_ms = elapsed.num_milliseconds().max(0) as u64;
        elapsed_ms < delay_ms
    }

    /// True when the retry budget is spent and the process must fail.
    pub fn retries_exhausted(&self, process: &TransferProcess) -> bool {
        process.state_count() >= self.send_retry_limit
    }
}
