//! A single ledger backed by an Excel workbook
//!
//! Every mutation rewrites the whole workbook before returning. The rewrite
//! goes to a sibling temp file that is synced and then renamed over the
//! ledger, so a crash leaves either the old or the new file, never a torn one.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;

use super::entry::{LedgerEntry, cols};
use crate::sheet::ResolvedKey;

const SHEET_NAME: &str = "Registros";

/// In-memory ledger mirrored to a workbook on disk
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<LedgerEntry>,
    keys: HashSet<ResolvedKey>,
    dirty: bool,
}

impl Ledger {
    /// Load the ledger at `path`, or start empty when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let entries = read_entries(&path)?;
            log::info!("Loaded {} ledger entries from {}", entries.len(), path.display());
            entries
        } else {
            log::debug!("No ledger at {}, starting empty", path.display());
            Vec::new()
        };

        let keys = entries.iter().filter_map(|e| e.dedup_key()).collect();
        Ok(Ledger {
            path,
            entries,
            keys,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &ResolvedKey) -> bool {
        self.keys.contains(key)
    }

    /// Add an entry and persist the whole ledger before returning
    pub fn append(&mut self, entry: LedgerEntry) -> Result<()> {
        if let Some(key) = entry.dedup_key() {
            self.keys.insert(key);
        }
        self.entries.push(entry);
        self.dirty = true;
        self.persist()
    }

    /// Add an entry, dropping any earlier entry with the same key
    pub fn replace(&mut self, entry: LedgerEntry) -> Result<()> {
        if let Some(key) = entry.dedup_key() {
            self.entries.retain(|e| e.dedup_key().as_ref() != Some(&key));
        }
        self.append(entry)
    }

    /// Remove all entries with this key; persists only when something was removed
    pub fn remove(&mut self, key: &ResolvedKey) -> Result<bool> {
        if !self.keys.remove(key) {
            return Ok(false);
        }
        self.entries.retain(|e| e.dedup_key().as_ref() != Some(key));
        self.dirty = true;
        self.persist()?;
        Ok(true)
    }

    /// Rewrite the file if memory is ahead of it
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        write_entries(&self.path, &self.entries)?;
        self.dirty = false;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open ledger: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .context("Ledger workbook has no sheets")?
        .clone();

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read ledger sheet: {}", sheet_name))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    // Map known columns by name so older nine-column files still load
    let positions: Vec<(usize, &'static str)> = header
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let name = cell_string(cell).trim().to_lowercase();
            cols::ALL
                .iter()
                .find(|c| **c == name)
                .map(|c| (idx, *c))
        })
        .collect();

    let mut entries = Vec::new();
    for row in rows {
        if row.iter().all(|c| cell_string(c).trim().is_empty()) {
            continue;
        }
        let mut entry = LedgerEntry::default();
        for (idx, column) in &positions {
            if let Some(cell) = row.get(*idx) {
                entry.set(column, cell_string(cell));
            }
        }
        entries.push(entry);
    }

    Ok(entries)
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

fn write_entries(path: &Path, entries: &[LedgerEntry]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in cols::ALL.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }

    for (row_idx, entry) in entries.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col, name) in cols::ALL.iter().enumerate() {
            let value = entry.get(name);
            if !value.is_empty() {
                worksheet.write_string(row, col as u16, value)?;
            }
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory: {}", parent.display()))?;
        }
    }

    let tmp = temp_path(path);
    workbook
        .save(&tmp)
        .with_context(|| format!("Failed to write ledger: {}", tmp.display()))?;
    File::open(&tmp)
        .and_then(|f| f.sync_all())
        .with_context(|| format!("Failed to sync ledger: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace ledger: {}", path.display()))?;

    log::debug!("Ledger {} written ({} entries)", path.display(), entries.len());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
