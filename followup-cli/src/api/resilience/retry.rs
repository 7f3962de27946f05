//! Retry policy for directory lookups
//!
//! The directory service is flaky under load, so callers can wrap a lookup
//! in a [`RetryPolicy`]. The default makes a single attempt.

use log::{debug, warn};
use rand::Rng;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// How the delay between attempts grows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    /// Doubling delay with jitter, capped at 15 seconds
    Exponential,
}

const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(15);

/// Retry behavior for a remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per attempt (1.0 = fixed delay)
    pub backoff_multiplier: f64,
    /// Randomize each delay by up to +/-25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// `attempts` tries with the same delay between each
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            base_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// `attempts` tries, doubling the delay after each failure
    pub fn exponential(attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            base_delay,
            max_delay: MAX_BACKOFF_DELAY.max(base_delay),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn with_backoff(backoff: Backoff, attempts: u32, base_delay: Duration) -> Self {
        match backoff {
            Backoff::Fixed => Self::fixed(attempts, base_delay),
            Backoff::Exponential => Self::exponential(attempts, base_delay),
        }
    }

    /// Delay to wait after `attempt` failed (1-based), before the next one
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }
}

/// Errors that know whether another attempt could help
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Executes an async operation according to a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.jittered(self.config.delay_after(attempt));
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range(0.75..=1.25);
        delay.mul_f64(factor)
    }
}
