// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic for connection establishment.
//!
//! Only startup work retries: the store pool and the cache connection are
//! retried a bounded number of times with a linear backoff. Operations that
//! fail after startup propagate to the caller untouched.
//!
//! # Example
//!
//! ```
//! use country_service::resilience::retry::{Backoff, RetryConfig};
//! use std::time::Duration;
//!
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_attempts, 5);
//! assert_eq!(startup.backoff, Backoff::Linear { step: Duration::from_secs(1) });
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `step * attempt` (1s, 2s, 3s, ...)
    Linear { step: Duration },
}

/// Configuration for connection retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one (always at least 1)
    pub max_attempts: usize,
    pub backoff: Backoff,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::startup()
    }
}

impl RetryConfig {
    /// Bounded retry for initial store/cache connections.
    /// 5 attempts with linear backoff (1s, 2s, 3s, 4s), giving up after ~10s.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::Linear { step: Duration::from_secs(1) },
            max_delay: Duration::from_secs(5),
        }
    }

    /// Fast retry for tests (minimal delays)
    #[must_use]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Linear { step: Duration::from_millis(1) },
            max_delay: Duration::from_millis(10),
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let attempt = u32::try_from(attempt.max(1)).unwrap_or(u32::MAX);
        let delay = match self.backoff {
            Backoff::Linear { step } => step.saturating_mul(attempt),
        };
        delay.min(self.max_delay)
    }
}

pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!("Operation '{}' succeeded after {} retries", operation_name, attempts);
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(err);
                }

                let delay = config.delay_after(attempts);
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, max_attempts, err, delay
                );
                sleep(delay).await;
            }
        }
    }
}
