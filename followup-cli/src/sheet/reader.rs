//! Read the input workbook with calamine

use std::path::Path;

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook};

use super::dates::{excel_serial_to_iso, to_display_date};
use super::{LoadError, LoadOptions, PREFERRED_SHEET, Sheet};

/// Load the selected sheet of a workbook as text rows
pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Sheet, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let mut workbook = open_workbook::<Xlsx<_>, _>(path).map_err(|e: XlsxError| LoadError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = pick_sheet(&sheet_names, options.sheet.as_deref()).ok_or_else(|| {
        match &options.sheet {
            Some(sheet) => LoadError::MissingSheet {
                path: path.to_path_buf(),
                sheet: sheet.clone(),
            },
            None => LoadError::Unreadable {
                path: path.to_path_buf(),
                reason: "workbook has no sheets".to_string(),
            },
        }
    })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: format!("sheet '{}': {}", sheet_name, e),
        })?;

    // calamine's range starts at the first used cell; pad it back to sheet row 0
    let leading = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut grid: Vec<Vec<String>> = std::iter::repeat_with(Vec::new)
        .take(leading)
        .chain(range.rows().map(|row| row.iter().map(cell_to_text).collect()))
        .collect();

    // Without an explicit header row, the first used row is the header
    let header_row = options.header_row.unwrap_or(leading);
    if header_row >= grid.len() {
        if grid.is_empty() {
            return Err(LoadError::NoRows {
                path: path.to_path_buf(),
            });
        }
        return Err(LoadError::HeaderOutOfRange {
            path: path.to_path_buf(),
            header_row,
            available: grid.len(),
        });
    }

    let data = grid.split_off(header_row + 1);
    let columns = grid.pop().unwrap_or_default();
    if data.is_empty() {
        return Err(LoadError::NoRows {
            path: path.to_path_buf(),
        });
    }

    log::info!(
        "Loaded sheet '{}' from {}: {} columns, {} rows (header on line {})",
        sheet_name,
        path.display(),
        columns.len(),
        data.len(),
        header_row + 1
    );
    log::debug!("Columns: {:?}", columns);

    // Header is on line header_row + 1, first data row right after it
    let mut sheet = Sheet::with_first_line(sheet_name, columns, data, header_row + 2);
    format_date_columns(&mut sheet, &options.date_columns);
    Ok(sheet)
}

/// Explicit name if present, else the preferred sheet, else the first one
fn pick_sheet(names: &[String], requested: Option<&str>) -> Option<String> {
    if let Some(requested) = requested {
        return names.iter().find(|n| n.as_str() == requested).cloned();
    }
    names
        .iter()
        .find(|n| n.as_str() == PREFERRED_SHEET)
        .or_else(|| names.first())
        .cloned()
}

/// Render a cell as text without lossy numeric coercion
fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // f64 Display never uses exponent notation and drops ".0" on whole numbers
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            excel_serial_to_iso(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string())
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Reformat configured date columns in place; failures keep the original text
fn format_date_columns(sheet: &mut Sheet, date_columns: &[String]) {
    let wanted: Vec<String> = date_columns.iter().map(|c| c.trim().to_lowercase()).collect();
    let indices: Vec<(usize, String)> = sheet
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| wanted.contains(&c.trim().to_lowercase()))
        .map(|(i, c)| (i, c.clone()))
        .collect();

    for (idx, column) in indices {
        let mut failed = 0usize;
        let mut first_failure: Option<String> = None;

        for values in sheet.values_mut() {
            let Some(value) = values.get_mut(idx) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            match to_display_date(value) {
                Some(formatted) => *value = formatted,
                None => {
                    failed += 1;
                    if first_failure.is_none() {
                        first_failure = Some(value.clone());
                    }
                }
            }
        }

        if failed > 0 {
            log::warn!(
                "Column '{}': {} value(s) not recognized as dates and left unchanged (e.g. {:?})",
                column,
                failed,
                first_failure.unwrap_or_default()
            );
        }
    }
}
