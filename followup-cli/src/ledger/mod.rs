//! Succeeded/failed ledgers that make re-runs idempotent
//!
//! Each tenant owns two workbooks in the data directory:
//! `succeeded_<tenant>.xlsx` and `failed_<tenant>.xlsx`. A key lives in at
//! most one of them; [`Ledgers`] keeps that true across writes.

pub mod entry;
pub mod lock;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

pub use entry::LedgerEntry;
pub use lock::LedgerLock;
pub use store::Ledger;

use crate::sheet::ResolvedKey;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));

/// File-name-safe form of a tenant name
pub fn tenant_slug(tenant: &str) -> String {
    let slug = UNSAFE_FILE_CHARS.replace_all(tenant.trim(), "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug.to_string()
    }
}

/// Paths of one tenant's ledger files
#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub succeeded: PathBuf,
    pub failed: PathBuf,
    pub lock: PathBuf,
}

impl LedgerPaths {
    pub fn for_tenant(dir: &Path, tenant: &str) -> Self {
        let slug = tenant_slug(tenant);
        LedgerPaths {
            succeeded: dir.join(format!("succeeded_{}.xlsx", slug)),
            failed: dir.join(format!("failed_{}.xlsx", slug)),
            lock: dir.join(format!("{}.lock", slug)),
        }
    }
}

/// The Succeeded/Failed pair for one batch
#[derive(Debug)]
pub struct Ledgers {
    pub succeeded: Ledger,
    pub failed: Ledger,
}

impl Ledgers {
    /// Load both ledgers and drop failed entries whose key already succeeded
    pub fn open(paths: &LedgerPaths) -> Result<Self> {
        let succeeded = Ledger::load(&paths.succeeded)?;
        let mut failed = Ledger::load(&paths.failed)?;

        let overlap: Vec<ResolvedKey> = failed
            .entries()
            .iter()
            .filter_map(|e| e.dedup_key())
            .filter(|k| succeeded.contains(k))
            .collect();
        for key in &overlap {
            failed.remove(key)?;
        }
        if !overlap.is_empty() {
            log::info!(
                "Removed {} failed entries that had already succeeded",
                overlap.len()
            );
        }

        Ok(Ledgers { succeeded, failed })
    }

    /// Whether this key was already processed successfully
    pub fn is_done(&self, key: &ResolvedKey) -> bool {
        self.succeeded.contains(key)
    }

    /// Record a success; a previous failure for the same key is cleared
    pub fn record_success(&mut self, entry: LedgerEntry) -> Result<()> {
        let key = entry.dedup_key();
        self.succeeded.append(entry)?;
        if let Some(key) = key {
            self.failed.remove(&key)?;
        }
        Ok(())
    }

    /// Record a failure, replacing any earlier failure for the same key
    pub fn record_failure(&mut self, entry: LedgerEntry) -> Result<()> {
        if let Some(key) = entry.dedup_key() {
            if self.succeeded.contains(&key) {
                log::warn!("Not recording failure for {}: already succeeded", key);
                return Ok(());
            }
        }
        self.failed.replace(entry)
    }

    /// Persist anything not yet on disk; both ledgers are attempted
    pub fn flush(&mut self) -> Result<()> {
        let succeeded = self.succeeded.flush();
        let failed = self.failed.flush();
        succeeded.and(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::KeyColumnKind;

    fn entry(cpf: &str) -> LedgerEntry {
        LedgerEntry {
            key: Some(KeyColumnKind::NaturalKey.normalize(cpf)),
            tax_id: cpf.to_string(),
            ..LedgerEntry::default()
        }
    }

    #[test]
    fn test_tenant_slug() {
        assert_eq!(tenant_slug("Aldeota"), "Aldeota");
        assert_eq!(tenant_slug(" Bezerra de Menezes "), "Bezerra_de_Menezes");
        assert_eq!(tenant_slug("../../etc"), "etc");
        assert_eq!(tenant_slug("///"), "default");
    }

    #[test]
    fn test_paths_are_per_tenant() {
        let a = LedgerPaths::for_tenant(Path::new("/data"), "Aldeota");
        let s = LedgerPaths::for_tenant(Path::new("/data"), "Sul");
        assert_ne!(a.succeeded, s.succeeded);
        assert_ne!(a.failed, s.failed);
        assert!(a.succeeded.ends_with("succeeded_Aldeota.xlsx"));
    }

    #[test]
    fn test_success_clears_previous_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LedgerPaths::for_tenant(dir.path(), "Sul");
        let key = KeyColumnKind::NaturalKey.normalize("111");

        let mut ledgers = Ledgers::open(&paths).unwrap();
        ledgers.record_failure(entry("111").with_reason("lookup")).unwrap();
        assert!(ledgers.failed.contains(&key));

        ledgers.record_success(entry("111")).unwrap();
        assert!(ledgers.is_done(&key));
        assert!(!ledgers.failed.contains(&key));

        let reopened = Ledgers::open(&paths).unwrap();
        assert!(reopened.succeeded.contains(&key));
        assert!(!reopened.failed.contains(&key));
    }

    #[test]
    fn test_open_repairs_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LedgerPaths::for_tenant(dir.path(), "Sul");
        let key = KeyColumnKind::NaturalKey.normalize("222");

        // Simulate a crash between the success append and the failure removal
        Ledger::load(&paths.failed).unwrap().append(entry("222")).unwrap();
        Ledger::load(&paths.succeeded).unwrap().append(entry("222")).unwrap();

        let ledgers = Ledgers::open(&paths).unwrap();
        assert!(ledgers.succeeded.contains(&key));
        assert!(!ledgers.failed.contains(&key));
    }

    #[test]
    fn test_failure_never_shadows_success() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LedgerPaths::for_tenant(dir.path(), "Sul");
        let key = KeyColumnKind::NaturalKey.normalize("333");

        let mut ledgers = Ledgers::open(&paths).unwrap();
        ledgers.record_success(entry("333")).unwrap();
        ledgers.record_failure(entry("333")).unwrap();
        assert!(!ledgers.failed.contains(&key));
    }
}
