//! Row key to remote record id
//!
//! One resolver serves all key kinds. Tax ids and names go through the
//! directory; remote ids are already what we need.

use log::{debug, warn};

use super::client::{DirectoryLookup, LookupFilter};
use super::models::{RemoteRecordId, TenantCredentials};
use super::resilience::{RetryConfig, RetryPolicy};
use crate::sheet::{KeyColumnKind, ResolvedKey};

/// Result of resolving one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(RemoteRecordId),
    /// The directory answered cleanly with zero matches
    NotFound,
    Failed(ResolutionFailure),
}

impl From<Resolution> for Option<RemoteRecordId> {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Found(id) => Some(id),
            Resolution::NotFound | Resolution::Failed(_) => None,
        }
    }
}

/// Why a key could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// Transport or remote fault, after all retry attempts
    LookupFailed { key: ResolvedKey, reason: String },
    /// No directory credentials for the batch tenant
    MissingCredentials { key: ResolvedKey },
}

impl std::fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionFailure::LookupFailed { key, reason } => {
                write!(f, "lookup for '{}' failed: {}", key, reason)
            }
            ResolutionFailure::MissingCredentials { key } => {
                write!(f, "cannot look up '{}': no directory credentials", key)
            }
        }
    }
}

impl std::error::Error for ResolutionFailure {}

pub struct IdentityResolver<L> {
    lookup: L,
    kind: KeyColumnKind,
    retry: RetryPolicy,
}

impl<L: DirectoryLookup> IdentityResolver<L> {
    /// Resolver with a single attempt per key
    pub fn new(lookup: L, kind: KeyColumnKind) -> Self {
        Self::with_retry(lookup, kind, RetryConfig::default())
    }

    pub fn with_retry(lookup: L, kind: KeyColumnKind, retry: RetryConfig) -> Self {
        Self {
            lookup,
            kind,
            retry: RetryPolicy::new(retry),
        }
    }

    pub fn kind(&self) -> KeyColumnKind {
        self.kind
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Map a normalized key to a record id
    ///
    /// Never returns an error: faults become [`Resolution::Failed`] so the
    /// caller can record the row and move on.
    pub async fn resolve(
        &self,
        key: &ResolvedKey,
        credentials: Option<&TenantCredentials>,
    ) -> Resolution {
        let filter = match self.kind {
            KeyColumnKind::RemoteId => return Resolution::Found(RemoteRecordId::new(key.as_str())),
            KeyColumnKind::NaturalKey => LookupFilter::TaxId(key.as_str().to_string()),
            KeyColumnKind::Name => LookupFilter::Name(key.as_str().to_string()),
        };

        let Some(credentials) = credentials else {
            return Resolution::Failed(ResolutionFailure::MissingCredentials { key: key.clone() });
        };

        let lookup = &self.lookup;
        let filter = &filter;
        let result = self
            .retry
            .execute("directory lookup", move || lookup.find_records(filter, credentials))
            .await;

        match result {
            Ok(ids) => {
                if ids.len() > 1 && self.kind == KeyColumnKind::Name {
                    warn!(
                        "{} records match name '{}'; using the first ({})",
                        ids.len(),
                        key,
                        ids[0]
                    );
                }
                match ids.into_iter().next() {
                    Some(id) => {
                        debug!("Resolved {} to record {}", key, id);
                        Resolution::Found(id)
                    }
                    None => {
                        debug!("No record for {}", key);
                        Resolution::NotFound
                    }
                }
            }
            Err(e) => Resolution::Failed(ResolutionFailure::LookupFailed {
                key: key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Convenience form of [`resolve`](Self::resolve): the id or nothing
    pub async fn resolve_id(
        &self,
        key: &ResolvedKey,
        credentials: Option<&TenantCredentials>,
    ) -> Option<RemoteRecordId> {
        self.resolve(key, credentials).await.into()
    }
}
