//! Bounded retry for the copy operation / 有限次重试
//!
//! Only failures classified as transient are retried; a deterministic
//! failure (permission, missing source) surfaces after the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100), Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Capped exponential wait after the given (1-based) failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff with equal jitter, never above the cap / 带抖动的等待时间
    fn jittered(&self, attempt: u32) -> Duration {
        let wait = self.backoff(attempt);
        let half = wait / 2;
        let spread = half.as_millis() as u64;
        if spread == 0 {
            return wait;
        }
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_transient() || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let wait = self.jittered(attempt);
                    warn!(
                        "Retryable error in {} (attempt {}/{}), retrying in {:?}: {}",
                        operation_name, attempt, self.max_attempts, wait, e
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
