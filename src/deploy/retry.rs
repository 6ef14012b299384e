//! Bounded retry driver with exponential backoff
//!
//! Failures are classified by [`PublishError::retry_class`]:
//!
//! | Class       | Examples                         | Action                          |
//! |-------------|----------------------------------|---------------------------------|
//! | Terminal    | 4xx, protocol errors             | returned immediately            |
//! | RateLimited | 429, Cloudflare code 971         | wait for reset, backoff frozen  |
//! | Transient   | transport errors, 5xx            | wait backoff, then double it    |

use crate::error::{PublishError, PublishResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on attempts per operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Upper bound for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// How a failure should be handled by the retrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Give up immediately
    Terminal,
    /// Wait for the provider-declared reset, if any
    RateLimited(Option<Duration>),
    /// Back off and try again
    Transient,
}

/// Retry bounds for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1))
    }
}

struct RetryState {
    attempt: u32,
    backoff: Duration,
}

type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Runs fallible operations under a [`RetryPolicy`]
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleep: SleepFn,
}

impl Retrier {
    /// Create a retrier that blocks the current thread while waiting
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleep: Arc::new(std::thread::sleep),
        }
    }

    /// Replace the sleep function (tests record waits instead of blocking)
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    /// Policy in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Block for `duration` using the configured sleep function
    pub fn sleep(&self, duration: Duration) {
        (self.sleep)(duration)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out
    pub fn exec<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> PublishResult<T>,
    ) -> PublishResult<T> {
        let mut state = RetryState {
            attempt: 0,
            backoff: self.policy.initial_backoff,
        };

        loop {
            state.attempt += 1;
            let err = match op() {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, state.attempt);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            let wait = match err.retry_class() {
                RetryClass::Terminal => return Err(err),
                RetryClass::RateLimited(reset) => reset.unwrap_or(state.backoff),
                RetryClass::Transient => {
                    let wait = state.backoff;
                    state.backoff = (state.backoff * 2).min(MAX_BACKOFF);
                    wait
                }
            };

            if state.attempt >= self.policy.max_attempts {
                return Err(PublishError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: state.attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                operation, state.attempt, self.policy.max_attempts, err, wait
            );
            self.sleep(wait);
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
