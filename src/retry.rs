//! Retry policy and the blocking wait primitive
//!
//! The query executor never counts attempts itself. After each timed-out
//! request it calls [`Backoff::wait`], which either sleeps (doubling the
//! delay each time, up to a cap) or reports the retry budget spent.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::{SparqlError, SparqlResult};

/// Retry configuration: budget, initial wait, wait cap
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each subsequent one
    pub retry_wait: Duration,
    /// Upper bound on a single wait
    pub retry_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 15,
            retry_wait: Duration::from_secs(5),
            retry_max: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Fresh wait state for one query call
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            retries: 0,
        }
    }
}

/// Per-call wait state handed out by [`RetryPolicy::backoff`]
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    retries: u32,
}

impl Backoff {
    /// Block until the next retry may be attempted.
    ///
    /// Fails with [`SparqlError::RetriesExhausted`] once the budget is
    /// spent; that failure is what ends the executor's retry loop.
    pub fn wait(&mut self) -> SparqlResult<()> {
        self.retries += 1;
        if self.retries > self.policy.max_retries {
            return Err(SparqlError::RetriesExhausted);
        }
        let delay = self.delay();
        warn!("Waiting {:.1} seconds before retrying", delay.as_secs_f64());
        thread::sleep(delay);
        Ok(())
    }

    /// Delay for the current retry: the initial wait doubled per retry,
    /// capped at the policy maximum
    fn delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.retries.saturating_sub(1));
        self.policy
            .retry_wait
            .saturating_mul(factor)
            .min(self.policy.retry_max)
    }
}
