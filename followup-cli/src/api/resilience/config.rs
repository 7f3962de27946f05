//! Resilience configuration with builder pattern
//!
//! Groups the retry policy for directory lookups with the timeouts used by
//! the UI waits and the HTTP clients.

use super::retry::RetryConfig;
use std::time::Duration;

/// Resilience settings for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
}

/// Bounds for waiting on the remote UI and HTTP endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Interval between condition checks
    pub poll: Duration,
    /// Upper bound for a single UI step to settle
    pub step: Duration,
    /// Per-request timeout for the directory and WebDriver clients
    pub http: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(250),
            step: Duration::from_secs(20),
            http: Duration::from_secs(30),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.config.timeouts.poll = poll;
        self
    }

    pub fn step_timeout(mut self, step: Duration) -> Self {
        self.config.timeouts.step = step;
        self
    }

    pub fn http_timeout(mut self, http: Duration) -> Self {
        self.config.timeouts.http = http;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResilienceConfig::default();

        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.timeouts.poll, Duration::from_millis(250));
        assert_eq!(config.timeouts.step, Duration::from_secs(20));
        assert_eq!(config.timeouts.http, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ResilienceConfig::builder()
            .retry_config(RetryConfig::fixed(4, Duration::from_millis(300)))
            .poll_interval(Duration::from_millis(100))
            .step_timeout(Duration::from_secs(5))
            .http_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.delay_after(2), Duration::from_millis(300));
        assert_eq!(config.timeouts.poll, Duration::from_millis(100));
        assert_eq!(config.timeouts.step, Duration::from_secs(5));
        assert_eq!(config.timeouts.http, Duration::from_secs(10));
    }
}
