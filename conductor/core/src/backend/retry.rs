//! Retry Policy
//!
//! Fixed per-class backoff for generation requests. Local inference servers
//! are often still loading a model when the first request lands, so each
//! failure class waits a different amount before the next attempt.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Broad category of a failed attempt, used to pick the backoff
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Non-200 status, malformed body, or any other error
    Api,
    /// The request exceeded its timeout
    Timeout,
    /// The backend could not be reached
    Connection,
}

/// Errors that can be sorted into a [`FailureClass`]
pub trait Classify {
    /// Failure class of this error
    fn failure_class(&self) -> FailureClass;
}

/// Retry configuration for generation requests
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after an API error
    pub api_error_backoff_ms: u64,

    /// Delay after a timeout
    pub timeout_backoff_ms: u64,

    /// Delay after a connection error
    pub connection_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            api_error_backoff_ms: 2_000,
            timeout_backoff_ms: 3_000,
            connection_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            api_error_backoff_ms: 0,
            timeout_backoff_ms: 0,
            connection_backoff_ms: 0,
        }
    }

    /// Backoff duration after a failure of the given class
    #[must_use]
    pub fn backoff_for(&self, class: FailureClass) -> Duration {
        let ms = match class {
            FailureClass::Api => self.api_error_backoff_ms,
            FailureClass::Timeout => self.timeout_backoff_ms,
            FailureClass::Connection => self.connection_backoff_ms,
        };
        Duration::from_millis(ms)
    }

    /// Attempts actually made (a zero setting still makes one attempt)
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// All attempts failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts made
    pub attempts: u32,
    /// Error from the final attempt
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. Between failed attempts the
/// helper sleeps for the policy's backoff for that failure class; there is no
/// sleep after the last attempt.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryExhausted<E>>
where
    E: Classify + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                warn!(attempt, max_attempts = attempts, error = %error, "Attempt failed");

                if attempt >= attempts {
                    return Err(RetryExhausted {
                        attempts,
                        last_error: error,
                    });
                }

                let delay = policy.backoff_for(error.failure_class());
                info!(delay_ms = delay.as_millis() as u64, "Retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
