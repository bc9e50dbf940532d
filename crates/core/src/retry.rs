//! Bounded, fixed-delay retry.
//!
//! [`Retry`] runs a unit of work until it succeeds or the policy's attempt budget
//! is spent. Every step of the loop is observable through a [`RetryListener`]:
//!
//! ```text
//! attempt 1: before_call → work → after_call → on_exception
//!            before_wait → sleep(delay) → after_wait
//! attempt 2: before_call → work → after_call → on_exception
//!            ...
//! attempt N: before_call → work → after_call → on_exception → on_max_attempts → Err(last)
//! ```
//!
//! The wait is a plain blocking sleep of the policy's delay: no backoff, no jitter.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{ConfigError, ConfigResult};

/// Retry policy: how many attempts, and how long to wait between two of them.
///
/// A value object; the same policy can drive any number of retry invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first call and must be at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> ConfigResult<Self> {
        if max_attempts < 1 {
            return Err(ConfigError::invalid_argument(
                "retry max attempts must be >= 1",
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// A policy that calls the work exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Hooks around each step of a retry loop. All hooks default to no-ops.
///
/// `attempt` is 1-indexed.
pub trait RetryListener {
    fn before_call(&self, _attempt: u32) {}

    fn after_call(&self, _attempt: u32) {}

    fn on_exception(&self, _attempt: u32, _error: &dyn Display) {}

    fn on_max_attempts(&self, _attempts: u32, _error: &dyn Display) {}

    fn before_wait(&self, _delay: Duration) {}

    fn after_wait(&self, _delay: Duration) {}
}

impl<L: RetryListener + ?Sized> RetryListener for &L {
    fn before_call(&self, attempt: u32) {
        (**self).before_call(attempt)
    }

    fn after_call(&self, attempt: u32) {
        (**self).after_call(attempt)
    }

    fn on_exception(&self, attempt: u32, error: &dyn Display) {
        (**self).on_exception(attempt, error)
    }

    fn on_max_attempts(&self, attempts: u32, error: &dyn Display) {
        (**self).on_max_attempts(attempts, error)
    }

    fn before_wait(&self, delay: Duration) {
        (**self).before_wait(delay)
    }

    fn after_wait(&self, delay: Duration) {
        (**self).after_wait(delay)
    }
}

/// Listener that ignores every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRetryListener;

impl RetryListener for NoopRetryListener {}

/// Listener that logs failures and waits for a named operation.
#[derive(Debug, Clone)]
pub struct LoggingRetryListener {
    operation: String,
}

impl LoggingRetryListener {
    /// `operation` completes the sentence "unable to ...", e.g. `"process record"`.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryListener for LoggingRetryListener {
    fn on_exception(&self, attempt: u32, error: &dyn Display) {
        warn!(operation = %self.operation, attempt, error = %error, "unable to {}", self.operation);
    }

    fn on_max_attempts(&self, attempts: u32, _error: &dyn Display) {
        error!(
            operation = %self.operation,
            attempts,
            "unable to {} after {} attempt(s)",
            self.operation,
            attempts
        );
    }

    fn before_wait(&self, delay: Duration) {
        debug!(
            operation = %self.operation,
            delay_ms = delay.as_millis() as u64,
            "waiting before retrying"
        );
    }
}

/// Executes work under a [`RetryPolicy`], notifying a [`RetryListener`].
#[derive(Debug, Clone)]
pub struct Retry<L = NoopRetryListener> {
    policy: RetryPolicy,
    listener: L,
}

impl Retry<NoopRetryListener> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            listener: NoopRetryListener,
        }
    }
}

impl<L: RetryListener> Retry<L> {
    pub fn with_listener(policy: RetryPolicy, listener: L) -> Self {
        Self { policy, listener }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `work` until it succeeds or the attempt budget is spent.
    ///
    /// On exhaustion the error of the last attempt is returned unchanged.
    pub fn execute<T, E, F>(&self, mut work: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.listener.before_call(attempt);
            let result = work();
            self.listener.after_call(attempt);

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            self.listener.on_exception(attempt, &err);
            if !self.policy.should_retry(attempt) {
                self.listener.on_max_attempts(attempt, &err);
                return Err(err);
            }

            let delay = self.policy.delay;
            self.listener.before_wait(delay);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            self.listener.after_wait(delay);
        }
    }
}
