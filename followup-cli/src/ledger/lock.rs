//! Per-tenant single-writer lock

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exclusive hold on a tenant's ledger files; released on drop
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    /// Create the lock file, failing with `AlreadyExists` when another batch holds it
    pub fn acquire(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;
        log::debug!("Acquired ledger lock {}", path.display());
        Ok(LedgerLock { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process id written by whoever holds the lock, if readable
    pub fn holder(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release ledger lock {}: {}", self.path.display(), e);
        } else {
            log::debug!("Released ledger lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sul.lock");

        let lock = LedgerLock::acquire(&path).unwrap();
        assert_eq!(LedgerLock::holder(&path), Some(std::process::id()));

        let err = LedgerLock::acquire(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);

        drop(lock);
        assert!(!path.exists());
        assert!(LedgerLock::acquire(&path).is_ok());
    }
}
