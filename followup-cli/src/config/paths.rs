//! Data directory layout

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ledger::LedgerPaths;

pub const APP_DIR_NAME: &str = "FollowUpAutomation";
pub const DEFAULT_INPUT_FILE: &str = "planilha_filtrada.xlsx";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// Platform data directory for this application (`<data dir>/FollowUpAutomation`)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Where inputs, ledgers and lock files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `--data-dir` when given, the platform default otherwise
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        Self::new(explicit.unwrap_or_else(default_data_dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_file(&self) -> PathBuf {
        self.root.join(DEFAULT_INPUT_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(DEFAULT_CONFIG_FILE)
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    pub fn ledger_paths(&self, tenant: &str) -> LedgerPaths {
        LedgerPaths::for_tenant(&self.root, tenant)
    }

    /// Create the directory if it does not exist yet
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create data directory: {}", self.root.display()))
    }
}
