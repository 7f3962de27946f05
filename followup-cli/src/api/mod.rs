//! Remote student directory
//!
//! A SOAP client for the directory service, the resolver that turns row keys
//! into record ids, and the retry/timeout settings both rely on.

pub mod client;
pub mod models;
pub mod resilience;
pub mod resolver;

pub use client::{DEFAULT_DIRECTORY_URL, DirectoryLookup, LookupError, LookupFilter, SoapDirectoryClient};
pub use models::{RemoteRecordId, TenantCredentials};
pub use resilience::{Backoff, ResilienceConfig, RetryConfig, RetryPolicy, RetryableError, TimeoutConfig};
pub use resolver::{IdentityResolver, Resolution, ResolutionFailure};
