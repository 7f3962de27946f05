//! Retry policy and timeouts for remote interactions

pub mod config;
pub mod retry;

pub use config::{ResilienceConfig, ResilienceConfigBuilder, TimeoutConfig};
pub use retry::{Backoff, RetryConfig, RetryPolicy, RetryableError};
