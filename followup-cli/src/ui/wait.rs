//! Condition polling with an upper bound

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::UiError;
use crate::api::TimeoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        (&TimeoutConfig::default()).into()
    }
}

impl From<&TimeoutConfig> for WaitConfig {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            timeout: timeouts.step,
            poll: timeouts.poll,
        }
    }
}

/// Poll `probe` until it yields a value or `config.timeout` elapses
///
/// The probe is always run at least once. Errors from the probe end the wait
/// immediately.
pub async fn wait_for<T, F, Fut>(config: &WaitConfig, step: &str, mut probe: F) -> Result<T, UiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, UiError>>,
{
    let started = Instant::now();
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            log::debug!("Gave up waiting for {} after {:?}", step, elapsed);
            return Err(UiError::Timeout {
                step: step.to_string(),
                after: config.timeout,
            });
        }
        tokio::time::sleep(config.poll.min(config.timeout - elapsed)).await;
    }
}
