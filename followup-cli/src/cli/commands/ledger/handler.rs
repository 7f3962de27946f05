//! Ledger command handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::*;

use super::{LedgerCommands, OutputFormat};
use crate::config::DataDir;
use crate::ledger::entry::cols;
use crate::ledger::{Ledger, LedgerEntry};
use crate::tenant::Tenant;

/// Handle the ledger command; returns the exit code
pub fn handle_ledger_command(args: LedgerCommands, data_dir: Option<PathBuf>) -> Result<i32> {
    let Some(tenant) = Tenant::from_name(&args.tenant) else {
        anyhow::bail!(
            "Unknown head office '{}' (expected one of {})",
            args.tenant,
            Tenant::ALL.map(|t| t.name()).join(", ")
        );
    };

    let data_dir = DataDir::resolve(data_dir);
    let paths = data_dir.ledger_paths(tenant.name());

    let mut sections = Vec::new();
    if !args.failed {
        sections.push(("succeeded", Ledger::load(&paths.succeeded)?));
    }
    if !args.succeeded {
        sections.push(("failed", Ledger::load(&paths.failed)?));
    }

    match args.format {
        OutputFormat::Table => {
            for (name, ledger) in &sections {
                println!(
                    "{} {} ({} entries)",
                    name.to_uppercase().bold(),
                    ledger.path().display().to_string().dimmed(),
                    ledger.len()
                );
                print!("{}", format_table(ledger.entries()));
                println!();
            }
        }
        OutputFormat::Json => {
            let value: serde_json::Map<String, serde_json::Value> = sections
                .iter()
                .map(|(name, ledger)| (name.to_string(), entries_to_json(ledger.entries())))
                .collect();
            let text = serde_json::to_string_pretty(&value).context("Failed to format JSON output")?;
            println!("{}", text);
        }
        OutputFormat::Csv => {
            for (name, ledger) in &sections {
                print!("{}", entries_to_csv(name, ledger.entries()));
            }
        }
    }

    Ok(0)
}

fn entries_to_json(entries: &[LedgerEntry]) -> serde_json::Value {
    let rows = entries
        .iter()
        .map(|entry| {
            let obj: serde_json::Map<String, serde_json::Value> = cols::ALL
                .iter()
                .filter(|c| !entry.get(c).is_empty())
                .map(|c| (c.to_string(), serde_json::Value::String(entry.get(c).to_string())))
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// CSV with a leading `ledger` column so both ledgers can share one stream
fn entries_to_csv(ledger: &str, entries: &[LedgerEntry]) -> String {
    let mut csv = String::new();
    csv.push_str("ledger,");
    csv.push_str(&cols::ALL.join(","));
    csv.push('\n');
    for entry in entries {
        let row: Vec<String> = cols::ALL.iter().map(|c| csv_escape(entry.get(c))).collect();
        csv.push_str(ledger);
        csv.push(',');
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

/// Key, name, tax id, and reason; enough to find the row again
fn format_table(entries: &[LedgerEntry]) -> String {
    const SHOWN: [&str; 4] = [cols::KEY, cols::FULL_NAME, cols::TAX_ID, cols::REASON];

    if entries.is_empty() {
        return "  (empty)\n".to_string();
    }

    let widths: Vec<usize> = SHOWN
        .iter()
        .map(|c| {
            entries
                .iter()
                .map(|e| e.get(c).chars().count())
                .max()
                .unwrap_or(0)
                .max(c.len())
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = SHOWN
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c, width = *w))
        .collect();
    out.push_str(&format!("  {}\n", header.join("  ")));
    for entry in entries {
        let cells: Vec<String> = SHOWN
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", entry.get(c), width = *w))
            .collect();
        out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
    }
    out
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
