//! Spreadsheet ingestion
//!
//! Reads the operator's workbook into text-only rows. Header selection,
//! sheet selection and date display formatting happen here; key
//! normalization lives in [`normalize`].

pub mod dates;
pub mod normalize;
mod reader;

use std::path::PathBuf;
use std::sync::Arc;

pub use normalize::{KeyColumnKind, ResolvedKey};
pub use reader::load;

/// Sheet picked when no explicit sheet name is configured and it exists
pub const PREFERRED_SHEET: &str = "Filtrada";

/// Options controlling how a workbook is loaded
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Explicit sheet name; falls back to [`PREFERRED_SHEET`], then the first sheet
    pub sheet: Option<String>,
    /// 0-based index of the header row; rows at and above it are not data
    pub header_row: Option<usize>,
    /// Columns reformatted to `DD/MM/YYYY` (case-insensitive)
    pub date_columns: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: None,
            date_columns: vec!["data_nascimento".to_string()],
        }
    }
}

/// One input record. Values are always text.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    line: usize,
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// 1-based line number in the source sheet
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value of the first column with exactly this name
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.get_at(idx)
    }

    /// Value of a column resolved the way [`Sheet::resolve_column`] does
    pub fn find(&self, column: &str) -> Option<&str> {
        let idx = position_of(&self.columns, column)?;
        self.get_at(idx)
    }

    pub fn get_at(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).map(|s| s.as_str())
    }

    /// (column, value) pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }
}

/// A loaded sheet: resolved column names plus ordered rows
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl Sheet {
    /// Build a sheet from in-memory records. Line numbers start at 2 (header on line 1).
    pub fn from_records(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self::with_first_line(name, columns, rows, 2)
    }

    pub(crate) fn with_first_line(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        first_line: usize,
    ) -> Self {
        let columns: Arc<[String]> = columns.into();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, mut values)| {
                values.resize(width, String::new());
                Row {
                    line: first_line + i,
                    columns: Arc::clone(&columns),
                    values,
                }
            })
            .collect();

        Sheet {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column: exact match first, then trimmed case-insensitive match
    pub fn resolve_column(&self, name: &str) -> Option<usize> {
        position_of(&self.columns, name)
    }

    /// Keep only the given column indices, in the given order
    pub fn project(&self, keep: &[usize]) -> Sheet {
        let columns: Arc<[String]> = keep
            .iter()
            .map(|&i| self.columns.get(i).cloned().unwrap_or_default())
            .collect::<Vec<_>>()
            .into();

        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                line: row.line,
                columns: Arc::clone(&columns),
                values: keep
                    .iter()
                    .map(|&i| row.values.get(i).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect();

        Sheet {
            name: self.name.clone(),
            columns,
            rows,
        }
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Vec<String>> {
        self.rows.iter_mut().map(|r| &mut r.values)
    }
}

fn position_of(columns: &[String], name: &str) -> Option<usize> {
    if let Some(idx) = columns.iter().position(|c| c == name) {
        return Some(idx);
    }
    let wanted = name.trim().to_lowercase();
    columns.iter().position(|c| c.trim().to_lowercase() == wanted)
}

/// Input workbook could not be turned into rows
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The file does not exist
    NotFound { path: PathBuf },
    /// The file exists but could not be opened or parsed as a workbook
    Unreadable { path: PathBuf, reason: String },
    /// The requested sheet is not in the workbook
    MissingSheet { path: PathBuf, sheet: String },
    /// The header row index points past the end of the sheet
    HeaderOutOfRange {
        path: PathBuf,
        header_row: usize,
        available: usize,
    },
    /// No data rows remain after header removal
    NoRows { path: PathBuf },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::NotFound { path } => {
                write!(f, "Input file not found: {}", path.display())
            }
            LoadError::Unreadable { path, reason } => {
                write!(f, "Failed to read workbook {}: {}", path.display(), reason)
            }
            LoadError::MissingSheet { path, sheet } => {
                write!(f, "Sheet '{}' not found in {}", sheet, path.display())
            }
            LoadError::HeaderOutOfRange {
                path,
                header_row,
                available,
            } => write!(
                f,
                "Header row {} is out of range for {} ({} rows)",
                header_row,
                path.display(),
                available
            ),
            LoadError::NoRows { path } => {
                write!(f, "No data rows after the header in {}", path.display())
            }
        }
    }
}

impl std::error::Error for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sheet {
        Sheet::from_records(
            "Filtrada",
            vec!["CPF".into(), "nome_completo".into(), "".into(), "CPF".into()],
            vec![
                vec!["111".into(), "Ana".into(), "x".into(), "dup".into()],
                vec!["222".into(), "Bruno".into()],
            ],
        )
    }

    #[test]
    fn test_get_returns_first_duplicate() {
        let sheet = sample();
        let row = &sheet.rows()[0];
        assert_eq!(row.get("CPF"), Some("111"));
        assert_eq!(row.get(""), Some("x"));
        assert_eq!(row.line(), 2);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let sheet = sample();
        let row = &sheet.rows()[1];
        assert_eq!(row.get_at(3), Some(""));
        assert_eq!(row.line(), 3);
    }

    #[test]
    fn test_resolve_column_falls_back_to_case_insensitive() {
        let sheet = sample();
        assert_eq!(sheet.resolve_column("CPF"), Some(0));
        assert_eq!(sheet.resolve_column(" cpf "), Some(0));
        assert_eq!(sheet.resolve_column("NOME_COMPLETO"), Some(1));
        assert_eq!(sheet.resolve_column("email"), None);
    }

    #[test]
    fn test_row_find_matches_like_resolve_column() {
        let sheet = sample();
        let row = &sheet.rows()[0];
        assert_eq!(row.find("cpf"), Some("111"));
        assert_eq!(row.find(" Nome_Completo"), Some("Ana"));
        assert_eq!(row.get("cpf"), None);
        assert_eq!(row.find("email"), None);
    }

    #[test]
    fn test_project_keeps_order_and_lines() {
        let sheet = sample().project(&[1, 0]);
        assert_eq!(sheet.columns(), &["nome_completo".to_string(), "CPF".to_string()]);
        let row = &sheet.rows()[1];
        assert_eq!(row.get("CPF"), Some("222"));
        assert_eq!(row.get("nome_completo"), Some("Bruno"));
        assert_eq!(row.line(), 3);
    }

    #[test]
    fn test_blank_row_detection() {
        let sheet = Sheet::from_records("s", vec!["a".into()], vec![vec!["  ".into()]]);
        assert!(sheet.rows()[0].is_blank());
    }
}
